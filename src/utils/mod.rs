pub mod ip;
pub mod keys;

pub use ip::client_ip;
pub use keys::{generate_api_key, generate_click_id, generate_os_user_key};
