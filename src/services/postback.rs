//! Tracker postback receiver.
//!
//! The downstream tracker reports offer outcomes (lead, sale) keyed by the
//! click id it was handed in the tracker URL. Outcomes are mapped onto
//! Facebook conversion events when the originating click carried pixel
//! credentials; otherwise the postback is acknowledged as a no-op.

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::{RelayError, Result};
use crate::events::EventLog;
use crate::outbound::facebook::{FacebookClient, FacebookEvent};
use crate::storage::{PostbackLogEntry, Repository};

#[derive(Debug, Deserialize)]
pub struct PostbackQuery {
    /// The click_id issued at click time (tracker external_id).
    pub subid: Option<String>,
    /// `lead` or `sale`.
    pub status: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

pub struct PostbackService;

impl PostbackService {
    /// GET /api/v1/postback
    pub async fn handle(
        req: HttpRequest,
        query: web::Query<PostbackQuery>,
        repository: web::Data<Arc<dyn Repository>>,
        events: web::Data<EventLog>,
        facebook: web::Data<FacebookClient>,
    ) -> Result<HttpResponse> {
        let params = query.into_inner();
        let Some(subid) = params.subid.as_deref().filter(|v| !v.is_empty()) else {
            return Err(RelayError::validation("Missing subid parameter"));
        };
        let Some(status) = params.status.as_deref().filter(|v| !v.is_empty()) else {
            return Err(RelayError::validation("Missing status parameter"));
        };

        info!(
            "Postback received: subid={} status={} amount={}",
            subid,
            status,
            params.amount.as_deref().unwrap_or("n/a")
        );

        let request_url = req.uri().to_string();
        let query_payload = json!({
            "subid": subid,
            "status": status,
            "amount": params.amount,
            "currency": params.currency,
        });

        let Some(click) = repository.find_click(subid).await? else {
            warn!("Click not found for subid: {}", subid);
            let preview: String = subid.chars().take(20).collect();
            let response_body = json!({
                "error": format!("Click not found for id: {}...", preview),
                "click_id": subid,
                "status": status,
            });
            events.record_postback(
                "Postback ignored: Click not found",
                PostbackLogEntry {
                    click_id: Some(subid.to_string()),
                    url: request_url,
                    method: "GET".to_string(),
                    payload: query_payload,
                    response_status: 404,
                    response_body: response_body.clone(),
                },
            );
            return Ok(HttpResponse::NotFound().json(response_body));
        };

        // A click without pixel credentials is a valid postback target, just
        // nothing to forward.
        if !click.has_fb_pixel() || click.fb_token.as_deref().is_none_or(str::is_empty) {
            let fb_reason = if click.fbclid.as_deref().is_none_or(str::is_empty) {
                "Missing fbclid"
            } else if click.fb_id.as_deref().is_none_or(str::is_empty) {
                "Missing FB Pixel ID"
            } else {
                "Missing FB Token"
            };
            let response_body = json!({
                "success": true,
                "message": format!(
                    "Postback received (status: {}). Click found but carries no FB pixel; no Facebook event sent.",
                    status
                ),
                "click_id": subid,
                "status": status,
                "click_found": true,
                "fb_tracking": false,
                "fb_reason": fb_reason,
            });
            events.record_postback(
                format!("Postback: {} (no FB)", status),
                PostbackLogEntry {
                    click_id: Some(subid.to_string()),
                    url: request_url,
                    method: "GET".to_string(),
                    payload: query_payload,
                    response_status: 200,
                    response_body: response_body.clone(),
                },
            );
            return Ok(HttpResponse::Ok().json(response_body));
        }

        let pixel_id = click.fb_id.as_deref().unwrap_or_default();
        let access_token = click.fb_token.as_deref().unwrap_or_default();
        let fbclid = click.fbclid.as_deref().unwrap_or_default();

        let (event_name, revenue) = match status {
            "lead" => {
                facebook
                    .send(FacebookEvent::registration(
                        pixel_id,
                        access_token,
                        fbclid,
                        &click.ip_address,
                        &click.user_agent,
                        Some(&click.click_id),
                    ))
                    .await;
                ("COMPLETE_REGISTRATION", None)
            }
            "sale" => {
                let value = params.amount.as_deref().and_then(|a| a.parse::<f64>().ok());
                let currency = params.currency.as_deref().unwrap_or("USD");
                facebook
                    .send(FacebookEvent::purchase(
                        pixel_id,
                        access_token,
                        fbclid,
                        &click.ip_address,
                        &click.user_agent,
                        Some(&click.click_id),
                        value,
                        Some(currency),
                    ))
                    .await;
                ("PURCHASE", value.map(|v| (v, currency.to_string())))
            }
            _ => {
                return Err(RelayError::validation("Invalid status. Use: lead or sale"));
            }
        };

        info!("Facebook {} event sent for subid: {}", event_name, subid);

        let mut response_body = json!({
            "success": true,
            "message": format!("{} event sent to Facebook", event_name),
            "subid": subid,
            "status": status,
        });
        if let Some((value, currency)) = &revenue {
            response_body["revenue"] = json!(value);
            response_body["currency"] = json!(currency);
        }

        events.record_postback(
            format!("Postback: {} ({})", status, event_name),
            PostbackLogEntry {
                click_id: Some(subid.to_string()),
                url: req.uri().to_string(),
                method: "GET".to_string(),
                payload: query_payload,
                response_status: 200,
                response_body: response_body.clone(),
            },
        );

        Ok(HttpResponse::Ok().json(response_body))
    }

    /// GET /api/v1/postback/stats
    pub async fn stats(repository: web::Data<Arc<dyn Repository>>) -> Result<HttpResponse> {
        let logs = repository.recent_postback_logs(1).await?;
        Ok(HttpResponse::Ok().json(json!({
            "message": "Postback events are forwarded to Facebook and audited in postback_logs",
            "last_postback_at": logs.first().map(|l| l.created_at),
        })))
    }
}
