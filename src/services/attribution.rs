//! Click-to-install attribution matching.
//!
//! The core of the relay: joins a device checkin against recent unconsumed
//! clicks from the same IP, scored by User-Agent similarity. Matching is
//! idempotent per device (keyed by os_user_key) and each click can be
//! consumed by at most one checkin, even under concurrent races.

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::errors::{RelayError, Result};
use crate::events::{EventKind, EventLog};
use crate::middleware::current_tenant;
use crate::outbound::facebook::{FacebookClient, FacebookEvent};
use crate::outbound::tracker::{TrackerParams, build_tracker_url};
use crate::services::similarity::user_agent_similarity;
use crate::storage::{Attribution, Click, NewAttribution, Repository};
use crate::utils::{client_ip, generate_os_user_key};

/// A checkin this soon after its matched click is implausibly fast for a
/// human install flow.
const FAST_MATCH_SECS: i64 = 5;
/// More attributions than this from one IP within an hour looks like a farm.
const IP_VELOCITY_LIMIT: u64 = 5;

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    pub idfv: Option<String>,
    pub idfa: Option<String>,
    pub app_version: Option<String>,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttributionResponse {
    pub success: bool,
    pub attributed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub push_sub: String,
    pub os_user_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_data: Option<Value>,
}

impl AttributionResponse {
    fn from_stored(attribution: &Attribution, campaign_data: Option<Value>) -> Self {
        AttributionResponse {
            success: true,
            attributed: attribution.click_id.is_some(),
            final_url: attribution.final_url.clone(),
            push_sub: attribution
                .push_sub
                .clone()
                .unwrap_or_else(|| "organic".to_string()),
            os_user_key: attribution.os_user_key.clone(),
            click_id: attribution.click_id.clone(),
            campaign_data,
        }
    }
}

pub struct AttributionService;

impl AttributionService {
    /// POST /api/v1/attribution: device checkin from the iOS SDK.
    pub async fn fetch(
        req: HttpRequest,
        body: web::Json<CheckinRequest>,
        repository: web::Data<Arc<dyn Repository>>,
        events: web::Data<EventLog>,
        facebook: web::Data<FacebookClient>,
        config: web::Data<AppConfig>,
    ) -> Result<HttpResponse> {
        let checkin = body.into_inner();
        let Some(idfv) = checkin.idfv.as_deref().filter(|v| !v.is_empty()) else {
            return Err(RelayError::validation("IDFV is required"));
        };

        let ip = client_ip(&req);
        let user_agent = checkin
            .user_agent
            .clone()
            .or_else(|| {
                req.headers()
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            })
            .unwrap_or_default();
        let tenant = current_tenant(&req);

        let os_user_key = generate_os_user_key(idfv, &config.security.api_secret);

        // Idempotent fetch: a device that already has an attribution gets
        // the stored outcome back, without rematching.
        if let Some(existing) = repository.find_attribution(&os_user_key).await? {
            info!("Returning existing attribution for {}", os_user_key);
            return Ok(HttpResponse::Ok().json(AttributionResponse::from_stored(&existing, None)));
        }

        let matched = Self::match_click(repository.as_ref().as_ref(), &ip, &user_agent, &config)
            .await?;

        if let Some(click) = &matched {
            Self::fraud_check(repository.as_ref().as_ref(), &events, click, &ip).await;
        }

        let push_sub = matched
            .as_ref()
            .and_then(|c| c.sub1.clone())
            .unwrap_or_else(|| "organic".to_string());

        // Conversion side channel, off the critical path.
        if let Some(click) = &matched {
            if click.has_fb_pixel() {
                facebook.dispatch(FacebookEvent::app_install(
                    click.fb_id.as_deref().unwrap_or_default(),
                    click.fb_token.as_deref().unwrap_or_default(),
                    click.fbclid.as_deref().unwrap_or_default(),
                    &ip,
                    &user_agent,
                    Some(&click.click_id),
                ));
            }
        }

        let tracker_params = TrackerParams::from_click(
            matched.as_ref(),
            &os_user_key,
            Some(idfv),
            checkin.app_version.as_deref(),
        );
        let final_url = build_tracker_url(
            &tracker_params,
            tenant.as_ref(),
            &config.tracker.default_campaign_url,
        )?;

        let stored = repository
            .insert_attribution(NewAttribution {
                os_user_key: os_user_key.clone(),
                click_id: matched.as_ref().map(|c| c.click_id.clone()),
                app_id: Some(
                    tenant
                        .as_ref()
                        .map(|t| t.app_id.clone())
                        .unwrap_or_else(|| "default".to_string()),
                ),
                ip_address: ip.clone(),
                user_agent: user_agent.clone(),
                idfa: checkin.idfa.clone(),
                idfv: Some(idfv.to_string()),
                device_model: checkin.device_model.clone(),
                os_version: checkin.os_version.clone(),
                app_version: checkin.app_version.clone(),
                push_sub: Some(push_sub.clone()),
                final_url: Some(final_url.clone()),
                attribution_source: "facebook".to_string(),
                ..Default::default()
            })
            .await?;

        let campaign_data = matched.as_ref().map(|c| {
            json!({
                "fbclid": c.fbclid,
                "sub1": c.sub1,
                "sub2": c.sub2,
                "sub3": c.sub3,
                "adsetid": c.adsetid,
            })
        });

        events.record(
            EventKind::Attribution,
            format!(
                "Attribution request: {}",
                if stored.click_id.is_some() { "MATCHED" } else { "ORGANIC" }
            ),
            Some(json!({
                "idfv": idfv,
                "click_id": stored.click_id,
                "push_sub": stored.push_sub,
                "final_url": stored.final_url,
            })),
        );

        Ok(HttpResponse::Ok().json(AttributionResponse::from_stored(&stored, campaign_data)))
    }

    /// Candidate search plus score-and-select plus atomic consume.
    ///
    /// Candidates come back newest first. A candidate qualifies when its
    /// score meets the configured minimum; among qualifying candidates a
    /// higher score always wins and ties go to the more recent click. The
    /// consume step is a conditional update, so a candidate lost to a
    /// concurrent checkin simply drops to the next-best one.
    async fn match_click(
        repository: &dyn Repository,
        ip: &str,
        user_agent: &str,
        config: &AppConfig,
    ) -> Result<Option<Click>> {
        let window = Duration::hours(config.attribution.window_hours);
        let candidates = repository.unconsumed_clicks(ip, window).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(f64, Click)> = candidates
            .into_iter()
            .filter_map(|click| {
                let score = user_agent_similarity(&click.user_agent, user_agent);
                (score >= config.attribution.min_ua_similarity).then_some((score, click))
            })
            .collect();
        // Stable sort preserves the newest-first ordering among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (score, click) in scored {
            if repository.consume_click(&click.click_id).await? {
                debug!(
                    "Matched click {} with similarity {:.2}",
                    click.click_id, score
                );
                return Ok(Some(click));
            }
            debug!(
                "Click {} consumed by a concurrent checkin, trying next candidate",
                click.click_id
            );
        }

        Ok(None)
    }

    /// Two advisory heuristics. Both only flag: attribution proceeds
    /// unchanged either way.
    async fn fraud_check(
        repository: &dyn Repository,
        events: &EventLog,
        click: &Click,
        ip: &str,
    ) {
        let elapsed = (Utc::now() - click.created_at).num_seconds();
        if elapsed < FAST_MATCH_SECS {
            warn!(
                "Suspicious attribution: {}s between click and checkin",
                elapsed
            );
            events.record_error(
                "fraud",
                "Suspicious attribution: too fast",
                json!({ "click_id": click.click_id, "seconds": elapsed, "ip": ip }),
            );
        }

        match repository
            .attributions_from_ip_since(ip, Utc::now() - Duration::hours(1))
            .await
        {
            Ok(count) if count > IP_VELOCITY_LIMIT => {
                warn!("Suspicious attribution: {} attributions from {} in 1h", count, ip);
                events.record_error(
                    "fraud",
                    "Suspicious attribution: IP velocity",
                    json!({ "ip": ip, "count": count }),
                );
            }
            Ok(_) => {}
            Err(e) => warn!("Fraud velocity check failed: {}", e),
        }
    }

    /// GET /api/v1/attribution/stats
    pub async fn stats(repository: web::Data<Arc<dyn Repository>>) -> Result<HttpResponse> {
        let stats = repository.attribution_stats().await?;
        let rate = if stats.total_attributions > 0 {
            stats.attributed_installs as f64 / stats.total_attributions as f64 * 100.0
        } else {
            0.0
        };

        Ok(HttpResponse::Ok().json(json!({
            "total_attributions": stats.total_attributions,
            "attributed_installs": stats.attributed_installs,
            "organic_installs": stats.organic_installs,
            "attribution_rate": rate,
        })))
    }
}
