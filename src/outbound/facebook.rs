//! Facebook Conversions API client.
//!
//! Server-side events (APP_INSTALL, COMPLETE_REGISTRATION, PURCHASE) scoped
//! to the per-click pixel id. Missing pixel credentials are a normal no-op.
//! Delivery failures are logged to the audit trail and never propagate to
//! the caller's response.

use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use tracing::{debug, warn};
use ureq::Agent;

use crate::events::EventLog;
use crate::storage::PostbackLogEntry;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";
const HTTP_TIMEOUT_SECS: u64 = 5;

static HTTP_AGENT: Lazy<Agent> = Lazy::new(|| {
    Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build()
        .into()
});

#[derive(Debug, Clone)]
pub struct FacebookEvent {
    pub event_name: &'static str,
    pub pixel_id: String,
    pub access_token: String,
    pub fbclid: String,
    pub ip: String,
    pub user_agent: String,
    /// Revenue block, PURCHASE only.
    pub value: Option<f64>,
    pub currency: Option<String>,
    /// For audit logging.
    pub click_id: Option<String>,
}

impl FacebookEvent {
    pub fn app_install(
        pixel_id: &str,
        access_token: &str,
        fbclid: &str,
        ip: &str,
        user_agent: &str,
        click_id: Option<&str>,
    ) -> Self {
        FacebookEvent {
            event_name: "APP_INSTALL",
            pixel_id: pixel_id.to_string(),
            access_token: access_token.to_string(),
            fbclid: fbclid.to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            value: None,
            currency: None,
            click_id: click_id.map(String::from),
        }
    }

    pub fn registration(
        pixel_id: &str,
        access_token: &str,
        fbclid: &str,
        ip: &str,
        user_agent: &str,
        click_id: Option<&str>,
    ) -> Self {
        FacebookEvent {
            event_name: "COMPLETE_REGISTRATION",
            ..Self::app_install(pixel_id, access_token, fbclid, ip, user_agent, click_id)
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn purchase(
        pixel_id: &str,
        access_token: &str,
        fbclid: &str,
        ip: &str,
        user_agent: &str,
        click_id: Option<&str>,
        value: Option<f64>,
        currency: Option<&str>,
    ) -> Self {
        FacebookEvent {
            event_name: "PURCHASE",
            value,
            currency: currency.map(String::from),
            ..Self::app_install(pixel_id, access_token, fbclid, ip, user_agent, click_id)
        }
    }
}

#[derive(Clone)]
pub struct FacebookClient {
    events: EventLog,
    /// Hostname used for event_source_url.
    domain: String,
}

impl FacebookClient {
    pub fn new(events: EventLog, domain: &str) -> Self {
        FacebookClient {
            events,
            domain: domain.to_string(),
        }
    }

    /// Fire-and-forget delivery; the caller's critical path never waits.
    pub fn dispatch(&self, event: FacebookEvent) {
        let client = self.clone();
        tokio::spawn(async move {
            client.send(event).await;
        });
    }

    /// Delivers one event. Always resolves; the outcome lands in the audit
    /// trail either way.
    pub async fn send(&self, event: FacebookEvent) {
        if event.pixel_id.is_empty() || event.access_token.is_empty() {
            debug!("No Facebook credentials, skipping {} event", event.event_name);
            return;
        }

        let url = format!("{}/{}/events", GRAPH_API_BASE, event.pixel_id);
        let payload = self.build_payload(&event);

        let request_url = url.clone();
        let request_payload = payload.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            Self::post_sync(&request_url, &request_payload)
        })
        .await
        .unwrap_or_else(|e| Err(format!("facebook dispatch task failed: {}", e)));

        match outcome {
            Ok((status, body)) => {
                if status < 400 {
                    debug!(
                        "Facebook {} event sent: pixel={} status={}",
                        event.event_name, event.pixel_id, status
                    );
                } else {
                    warn!(
                        "Facebook {} event rejected: pixel={} status={}",
                        event.event_name, event.pixel_id, status
                    );
                    self.events.record_error(
                        "facebook_api",
                        format!("Facebook API error: {}", event.event_name),
                        json!({ "pixel_id": event.pixel_id, "status": status, "body": body }),
                    );
                }
                self.events.record_postback(
                    format!("FB Outbound: {}", event.event_name),
                    PostbackLogEntry {
                        click_id: event.click_id.clone(),
                        url,
                        method: "POST".to_string(),
                        payload,
                        response_status: status as i32,
                        response_body: body,
                    },
                );
            }
            Err(message) => {
                warn!(
                    "Facebook {} event failed: pixel={} error={}",
                    event.event_name, event.pixel_id, message
                );
                self.events.record_error(
                    "facebook_api",
                    format!("Facebook API error: {}", event.event_name),
                    json!({ "pixel_id": event.pixel_id, "error": message }),
                );
                self.events.record_postback(
                    format!("FB Outbound Failed: {}", event.event_name),
                    PostbackLogEntry {
                        click_id: event.click_id.clone(),
                        url,
                        method: "POST".to_string(),
                        payload,
                        response_status: 500,
                        response_body: Value::String(message),
                    },
                );
            }
        }
    }

    fn build_payload(&self, event: &FacebookEvent) -> Value {
        let now_millis = Utc::now().timestamp_millis();
        let mut event_data = json!({
            "event_name": event.event_name,
            "event_time": Utc::now().timestamp(),
            "action_source": "website",
            "event_source_url": format!("https://{}", self.domain),
            "user_data": {
                "client_ip_address": event.ip,
                "client_user_agent": event.user_agent,
                "fbc": format!("fb.1.{}.{}", now_millis, event.fbclid),
            }
        });

        // Revenue block is required for ROAS optimization on purchases.
        if let Some(value) = event.value {
            if value > 0.0 {
                event_data["custom_data"] = json!({
                    "value": value,
                    "currency": event.currency.as_deref().unwrap_or("USD"),
                });
            }
        }

        json!({
            "data": [event_data],
            "access_token": event.access_token,
        })
    }

    pub(crate) fn post_sync(url: &str, payload: &Value) -> Result<(u16, Value), String> {
        let resp = HTTP_AGENT
            .post(url)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_payload_carries_revenue_block() {
        let client = FacebookClient::new(EventLog::new(), "ads.example.com");
        let event = FacebookEvent::purchase(
            "px1",
            "token",
            "fbclid-1",
            "1.2.3.4",
            "ua",
            Some("clk_x"),
            Some(49.9),
            Some("EUR"),
        );

        let payload = client.build_payload(&event);
        let data = &payload["data"][0];
        assert_eq!(data["event_name"], "PURCHASE");
        assert_eq!(data["custom_data"]["value"], 49.9);
        assert_eq!(data["custom_data"]["currency"], "EUR");
        assert_eq!(data["event_source_url"], "https://ads.example.com");
        assert!(
            data["user_data"]["fbc"]
                .as_str()
                .unwrap()
                .starts_with("fb.1.")
        );
    }

    #[test]
    fn install_payload_has_no_revenue_block() {
        let client = FacebookClient::new(EventLog::new(), "ads.example.com");
        let event =
            FacebookEvent::app_install("px1", "token", "fbclid-1", "1.2.3.4", "ua", None);

        let payload = client.build_payload(&event);
        assert!(payload["data"][0].get("custom_data").is_none());
        assert_eq!(payload["access_token"], "token");
    }
}
