pub mod auth;
pub mod tenant;

pub use auth::AuthMiddleware;
pub use tenant::{TenantMiddleware, current_tenant};
