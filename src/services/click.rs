//! Click recording.
//!
//! Accepts ad-network redirect hits on several path aliases, persists one
//! click row per hit and sends the visitor on to the tenant's App Store
//! page. A short per-IP debounce collapses accidental double-fires; the
//! duplicate hit still gets its redirect, just no second row.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpRequest, HttpResponse, web};
use moka::sync::Cache;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::Result;
use crate::events::{EventKind, EventLog};
use crate::middleware::current_tenant;
use crate::storage::{NewClick, Repository};
use crate::utils::{client_ip, generate_click_id};

const DEBOUNCE_CACHE_CAPACITY: u64 = 100_000;
const FALLBACK_STORE_URL: &str = "https://apps.apple.com";

/// Per-IP debounce window backed by a TTL cache. Entries expire on their
/// own; the cache only answers "did this IP click within the window".
#[derive(Clone)]
pub struct ClickDebounce {
    cache: Cache<String, ()>,
}

impl ClickDebounce {
    pub fn new(window: Duration) -> Self {
        ClickDebounce {
            cache: Cache::builder()
                .time_to_live(window)
                .max_capacity(DEBOUNCE_CACHE_CAPACITY)
                .build(),
        }
    }

    /// True when the IP already fired within the window. The first caller
    /// claims the slot atomically, so concurrent duplicates collapse to one.
    pub fn is_duplicate(&self, ip: &str) -> bool {
        let entry = self.cache.entry(ip.to_string()).or_insert(());
        !entry.is_fresh()
    }
}

pub struct ClickService;

impl ClickService {
    /// GET on /api/v1/track/click, /t, /click, /track.
    pub async fn track_click(
        req: HttpRequest,
        query: web::Query<HashMap<String, String>>,
        repository: web::Data<Arc<dyn Repository>>,
        events: web::Data<EventLog>,
        debounce: web::Data<ClickDebounce>,
        config: web::Data<AppConfig>,
    ) -> Result<HttpResponse> {
        let Some(tenant) = current_tenant(&req) else {
            return Ok(
                HttpResponse::BadRequest().json(json!({ "error": "Tenant not configured" }))
            );
        };

        let ip_address = client_ip(&req);
        let user_agent = req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let store_url = tenant
            .app_store_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(String::from)
            .unwrap_or_else(|| {
                if config.tenant_defaults.app_store_url.is_empty() {
                    FALLBACK_STORE_URL.to_string()
                } else {
                    config.tenant_defaults.app_store_url.clone()
                }
            });

        if debounce.is_duplicate(&ip_address) {
            debug!("Click debounced for {}, redirecting without insert", ip_address);
            return Ok(Self::redirect(&store_url));
        }

        let click_id = generate_click_id();
        let sub1 = scrub_param(&query, "sub1");

        let new_click = NewClick {
            click_id: click_id.clone(),
            app_id: Some(tenant.app_id.clone()),
            ip_address: ip_address.clone(),
            user_agent,
            fbclid: scrub_param(&query, "fbclid"),
            sub1: sub1.clone(),
            sub2: scrub_param(&query, "sub2"),
            sub3: scrub_param(&query, "sub3"),
            sub4: scrub_param(&query, "sub4"),
            sub5: scrub_param(&query, "sub5"),
            adsetid: scrub_param(&query, "adsetid"),
            fb_id: scrub_param(&query, "fb_id"),
            fb_token: scrub_param(&query, "fb_token"),
        };
        let has_fb_pixel = new_click.fb_id.is_some();
        repository.insert_click(new_click).await?;

        events.record(
            EventKind::Click,
            format!(
                "New click: {}",
                sub1.as_deref().unwrap_or("unknown_campaign")
            ),
            Some(json!({
                "click_id": click_id,
                "sub1": sub1,
                "source": scrub_param(&query, "sub2"),
                "ip": ip_address,
                "app": tenant.app_name,
                "has_fb_pixel": has_fb_pixel,
            })),
        );

        if tenant.app_store_url.as_deref().is_none_or(str::is_empty) {
            warn!(
                "No app_store_url for tenant {}, using fallback {}",
                tenant.app_id, store_url
            );
        }

        Ok(Self::redirect(&store_url))
    }

    /// GET /api/v1/clicks/stats
    pub async fn stats(repository: web::Data<Arc<dyn Repository>>) -> Result<HttpResponse> {
        let stats = repository.click_stats().await?;
        let rate = if stats.total_clicks > 0 {
            stats.attributed_clicks as f64 / stats.total_clicks as f64 * 100.0
        } else {
            0.0
        };

        Ok(HttpResponse::Ok().json(json!({
            "total_clicks": stats.total_clicks,
            "attributed_clicks": stats.attributed_clicks,
            "clicks_last_24h": stats.clicks_last_24h,
            "attribution_rate": rate,
        })))
    }

    /// GET /: click tracking when tracking parameters are present, an
    /// info page otherwise.
    pub async fn root(
        req: HttpRequest,
        query: web::Query<HashMap<String, String>>,
        repository: web::Data<Arc<dyn Repository>>,
        events: web::Data<EventLog>,
        debounce: web::Data<ClickDebounce>,
        config: web::Data<AppConfig>,
    ) -> Result<HttpResponse> {
        if query.contains_key("fb_id")
            || query.contains_key("fbclid")
            || query.contains_key("sub1")
        {
            return Self::track_click(req, query, repository, events, debounce, config).await;
        }

        Ok(HttpResponse::Ok().json(json!({
            "message": "Attribution System",
            "endpoints": {
                "click_tracking": [
                    "/api/v1/track/click",
                    "/t",
                    "/click",
                    "/track",
                    "/ (with parameters)"
                ],
                "attribution": "/api/v1/attribution",
                "postback": "/api/v1/postback"
            }
        })))
    }

    fn redirect(location: &str) -> HttpResponse {
        HttpResponse::Found()
            .insert_header(("Location", location.to_string()))
            .finish()
    }
}

/// Query value with un-substituted ad-network macros treated as absent:
/// a value still literally wrapped in `{{...}}` was never expanded.
fn scrub_param(query: &HashMap<String, String>, key: &str) -> Option<String> {
    query
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .filter(|v| !(v.starts_with("{{") && v.ends_with("}}")))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn scrub_drops_unexpanded_macros_and_empties() {
        let query = query_of(&[
            ("sub1", "camp7"),
            ("sub2", "{{campaign.id}}"),
            ("sub3", ""),
            ("sub4", "  "),
        ]);
        assert_eq!(scrub_param(&query, "sub1"), Some("camp7".to_string()));
        assert_eq!(scrub_param(&query, "sub2"), None);
        assert_eq!(scrub_param(&query, "sub3"), None);
        assert_eq!(scrub_param(&query, "sub4"), None);
        assert_eq!(scrub_param(&query, "sub5"), None);
    }

    #[test]
    fn debounce_collapses_hits_within_window() {
        let debounce = ClickDebounce::new(Duration::from_secs(2));
        assert!(!debounce.is_duplicate("1.2.3.4"));
        assert!(debounce.is_duplicate("1.2.3.4"));
        // Different IP gets its own slot.
        assert!(!debounce.is_duplicate("5.6.7.8"));
    }

    #[test]
    fn debounce_expires_after_window() {
        let debounce = ClickDebounce::new(Duration::from_millis(30));
        assert!(!debounce.is_duplicate("1.2.3.4"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(!debounce.is_duplicate("1.2.3.4"));
    }
}
