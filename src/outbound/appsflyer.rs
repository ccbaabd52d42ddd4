//! AppsFlyer S2S in-app-event client.
//!
//! Forwards lifecycle events (registration, deposit) to AppsFlyer so they
//! reach the originating ad network. Authenticated by the tenant's dev key.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use tracing::{info, warn};
use ureq::Agent;

use crate::errors::{RelayError, Result};
use crate::events::EventLog;
use crate::storage::PostbackLogEntry;

const INAPP_EVENT_BASE: &str = "https://api2.appsflyer.com/inappevent";
const HTTP_TIMEOUT_SECS: u64 = 10;

static HTTP_AGENT: Lazy<Agent> = Lazy::new(|| {
    Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build()
        .into()
});

pub struct AppsFlyerClient {
    dev_key: String,
    /// Bundle id, scopes the in-app-event endpoint.
    app_id: String,
    events: EventLog,
}

impl AppsFlyerClient {
    pub fn new(dev_key: &str, app_id: &str, events: EventLog) -> Self {
        AppsFlyerClient {
            dev_key: dev_key.to_string(),
            app_id: app_id.to_string(),
            events,
        }
    }

    pub async fn send_registration(&self, appsflyer_id: &str, idfv: &str) -> Result<()> {
        self.send_event(
            appsflyer_id,
            idfv,
            "af_complete_registration",
            json!({
                "af_content_id": "registration",
                "af_registration_method": "email",
            }),
        )
        .await
    }

    pub async fn send_deposit(
        &self,
        appsflyer_id: &str,
        idfv: &str,
        amount: f64,
        currency: &str,
    ) -> Result<()> {
        self.send_event(
            appsflyer_id,
            idfv,
            "af_purchase",
            json!({
                "af_revenue": amount,
                "af_currency": currency,
                "af_content_id": "deposit",
                "af_content_type": "first_deposit",
            }),
        )
        .await
    }

    /// Delivers one in-app event. Unlike the Facebook channel this surface
    /// is invoked synchronously from the postback handler, so failures
    /// propagate to the response after being audited.
    pub async fn send_event(
        &self,
        appsflyer_id: &str,
        idfv: &str,
        event_name: &str,
        event_value: Value,
    ) -> Result<()> {
        let url = format!("{}/{}", INAPP_EVENT_BASE, self.app_id);
        let payload = json!({
            "appsflyer_id": appsflyer_id,
            "customer_user_id": idfv,
            "eventName": event_name,
            "eventValue": event_value,
            "eventTime": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });

        let dev_key = self.dev_key.clone();
        let request_url = url.clone();
        let request_payload = payload.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            Self::post_sync(&request_url, &dev_key, &request_payload)
        })
        .await
        .unwrap_or_else(|e| Err(format!("appsflyer dispatch task failed: {}", e)));

        match outcome {
            Ok((status, body)) if status < 400 => {
                info!(
                    "AppsFlyer {} event sent: app={} status={}",
                    event_name, self.app_id, status
                );
                self.events.record_postback(
                    format!("AppsFlyer Outbound: {}", event_name),
                    PostbackLogEntry {
                        click_id: Some(appsflyer_id.to_string()),
                        url,
                        method: "POST".to_string(),
                        payload,
                        response_status: status as i32,
                        response_body: body,
                    },
                );
                Ok(())
            }
            Ok((status, body)) => {
                warn!(
                    "AppsFlyer {} event rejected: app={} status={}",
                    event_name, self.app_id, status
                );
                self.events.record_error(
                    "appsflyer_api",
                    format!("AppsFlyer S2S error: {}", event_name),
                    json!({ "appsflyer_id": appsflyer_id, "status": status, "body": body }),
                );
                self.events.record_postback(
                    format!("AppsFlyer Outbound Failed: {}", event_name),
                    PostbackLogEntry {
                        click_id: Some(appsflyer_id.to_string()),
                        url,
                        method: "POST".to_string(),
                        payload,
                        response_status: status as i32,
                        response_body: body,
                    },
                );
                Err(RelayError::outbound(format!(
                    "AppsFlyer API returned status {}",
                    status
                )))
            }
            Err(message) => {
                warn!(
                    "AppsFlyer {} event failed: app={} error={}",
                    event_name, self.app_id, message
                );
                self.events.record_error(
                    "appsflyer_api",
                    format!("AppsFlyer S2S error: {}", event_name),
                    json!({ "appsflyer_id": appsflyer_id, "error": message }),
                );
                self.events.record_postback(
                    format!("AppsFlyer Outbound Failed: {}", event_name),
                    PostbackLogEntry {
                        click_id: Some(appsflyer_id.to_string()),
                        url,
                        method: "POST".to_string(),
                        payload,
                        response_status: 500,
                        response_body: Value::String(message.clone()),
                    },
                );
                Err(RelayError::outbound(format!(
                    "AppsFlyer API error: {}",
                    message
                )))
            }
        }
    }

    fn post_sync(
        url: &str,
        dev_key: &str,
        payload: &Value,
    ) -> std::result::Result<(u16, Value), String> {
        let resp = HTTP_AGENT
            .post(url)
            .header("authentication", dev_key)
            .send_json(payload)
            .map_err(|e| e.to_string())?;

        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .read_json::<Value>()
            .unwrap_or(Value::Null);
        Ok((status, body))
    }
}
