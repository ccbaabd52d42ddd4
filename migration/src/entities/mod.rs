pub mod app_tenant;
pub mod attribution;
pub mod click;
pub mod error_log;
pub mod postback_log;
