pub mod admin;
pub mod apple;
pub mod appsflyer;
pub mod attribution;
pub mod click;
pub mod health;
pub mod postback;
pub mod similarity;

pub use admin::AdminService;
pub use apple::AppleService;
pub use appsflyer::AppsFlyerService;
pub use attribution::{AttributionResponse, AttributionService, CheckinRequest};
pub use click::{ClickDebounce, ClickService};
pub use health::HealthService;
pub use postback::PostbackService;
