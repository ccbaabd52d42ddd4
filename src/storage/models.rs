//! Domain models passed between handlers, services and the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Click {
    pub click_id: String,
    pub app_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub fbclid: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub sub3: Option<String>,
    pub sub4: Option<String>,
    pub sub5: Option<String>,
    pub adsetid: Option<String>,
    pub fb_id: Option<String>,
    pub fb_token: Option<String>,
    pub attributed: bool,
    pub attributed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Click {
    pub fn has_fb_pixel(&self) -> bool {
        self.fb_id.as_deref().is_some_and(|v| !v.is_empty())
            && self.fbclid.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewClick {
    pub click_id: String,
    pub app_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub fbclid: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub sub3: Option<String>,
    pub sub4: Option<String>,
    pub sub5: Option<String>,
    pub adsetid: Option<String>,
    pub fb_id: Option<String>,
    pub fb_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
    pub os_user_key: String,
    pub click_id: Option<String>,
    pub app_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub idfa: Option<String>,
    pub idfv: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub push_sub: Option<String>,
    pub final_url: Option<String>,
    pub attribution_source: String,
    pub appsflyer_id: Option<String>,
    pub media_source: Option<String>,
    pub campaign: Option<String>,
    pub af_sub1: Option<String>,
    pub af_sub2: Option<String>,
    pub af_sub3: Option<String>,
    pub af_sub4: Option<String>,
    pub af_sub5: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAttribution {
    pub os_user_key: String,
    pub click_id: Option<String>,
    pub app_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub idfa: Option<String>,
    pub idfv: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub push_sub: Option<String>,
    pub final_url: Option<String>,
    pub attribution_source: String,
    pub appsflyer_id: Option<String>,
    pub media_source: Option<String>,
    pub campaign: Option<String>,
    pub af_sub1: Option<String>,
    pub af_sub2: Option<String>,
    pub af_sub3: Option<String>,
    pub af_sub4: Option<String>,
    pub af_sub5: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTenant {
    pub app_id: String,
    pub domain: String,
    pub team_id: String,
    pub bundle_id: String,
    pub app_name: Option<String>,
    pub api_key: String,
    pub app_store_url: Option<String>,
    pub tracker_campaign_url: Option<String>,
    pub appsflyer_dev_key: Option<String>,
    pub appsflyer_enabled: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostbackLog {
    pub id: i64,
    pub click_id: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub payload: Option<String>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PostbackLogEntry {
    pub click_id: Option<String>,
    pub url: String,
    pub method: String,
    pub payload: serde_json::Value,
    pub response_status: i32,
    pub response_body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorLog {
    pub id: i64,
    pub kind: Option<String>,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickStats {
    pub total_clicks: u64,
    pub attributed_clicks: u64,
    pub clicks_last_24h: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributionStats {
    pub total_attributions: u64,
    pub attributed_installs: u64,
    pub organic_installs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeTarget {
    Clicks,
    Attributions,
    PostbackLogs,
    ErrorLogs,
}
