//! AppsFlyer attribution callback and tracker-side postback.
//!
//! The iOS SDK posts AppsFlyer conversion data after install; the tracker
//! later reports lifecycle events that get forwarded to AppsFlyer's S2S
//! in-app-event API using the tenant's dev key.

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::{RelayError, Result};
use crate::events::EventLog;
use crate::middleware::current_tenant;
use crate::outbound::AppsFlyerClient;
use crate::outbound::tracker::{TrackerParams, build_tracker_url};
use crate::storage::{NewAttribution, Repository};
use crate::utils::{client_ip, generate_os_user_key};

#[derive(Debug, Deserialize)]
pub struct AppsFlyerAttributionRequest {
    pub appsflyer_id: Option<String>,
    /// Device IDFV.
    pub customer_user_id: Option<String>,
    pub media_source: Option<String>,
    pub campaign: Option<String>,
    pub af_sub1: Option<String>,
    pub af_sub2: Option<String>,
    pub af_sub3: Option<String>,
    pub af_sub4: Option<String>,
    pub af_sub5: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppsFlyerPostbackQuery {
    pub appsflyer_id: Option<String>,
    pub idfv: Option<String>,
    /// `registration` or `deposit`.
    pub event: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

pub struct AppsFlyerService;

impl AppsFlyerService {
    /// POST /api/v1/attribution/appsflyer
    pub async fn attribution_callback(
        req: HttpRequest,
        body: web::Json<AppsFlyerAttributionRequest>,
        repository: web::Data<Arc<dyn Repository>>,
        config: web::Data<AppConfig>,
    ) -> Result<HttpResponse> {
        let data = body.into_inner();
        let (Some(appsflyer_id), Some(customer_user_id)) = (
            data.appsflyer_id.as_deref().filter(|v| !v.is_empty()),
            data.customer_user_id.as_deref().filter(|v| !v.is_empty()),
        ) else {
            return Err(RelayError::validation(
                "Missing required fields: appsflyer_id, customer_user_id",
            ));
        };

        let tenant = current_tenant(&req);
        let os_user_key = generate_os_user_key(customer_user_id, &config.security.api_secret);
        let push_sub = data
            .af_sub1
            .clone()
            .unwrap_or_else(|| "organic".to_string());

        let tracker_params = TrackerParams::from_appsflyer(
            appsflyer_id,
            data.media_source.as_deref(),
            data.campaign.as_deref(),
            [
                data.af_sub1.as_deref(),
                data.af_sub2.as_deref(),
                data.af_sub3.as_deref(),
                data.af_sub4.as_deref(),
                data.af_sub5.as_deref(),
            ],
            &os_user_key,
            Some(customer_user_id),
            data.app_version.as_deref(),
        );
        let final_url = build_tracker_url(
            &tracker_params,
            tenant.as_ref(),
            &config.tracker.default_campaign_url,
        )?;

        // Repeated callbacks refresh the campaign fields in place.
        repository
            .upsert_appsflyer_attribution(NewAttribution {
                os_user_key: os_user_key.clone(),
                click_id: Some(appsflyer_id.to_string()),
                app_id: Some(
                    tenant
                        .as_ref()
                        .map(|t| t.app_id.clone())
                        .unwrap_or_else(|| "default".to_string()),
                ),
                ip_address: client_ip(&req),
                user_agent: req
                    .headers()
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string(),
                idfv: Some(customer_user_id.to_string()),
                push_sub: Some(push_sub.clone()),
                final_url: Some(final_url.clone()),
                attribution_source: "appsflyer".to_string(),
                appsflyer_id: Some(appsflyer_id.to_string()),
                media_source: data.media_source.clone(),
                campaign: data.campaign.clone(),
                af_sub1: data.af_sub1.clone(),
                af_sub2: data.af_sub2.clone(),
                af_sub3: data.af_sub3.clone(),
                af_sub4: data.af_sub4.clone(),
                af_sub5: data.af_sub5.clone(),
                ..Default::default()
            })
            .await?;

        info!(
            "AppsFlyer attribution saved: source={:?} campaign={:?} push_sub={}",
            data.media_source, data.campaign, push_sub
        );

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "attributed": true,
            "final_url": final_url,
            "push_sub": push_sub,
            "os_user_key": os_user_key,
            "click_id": appsflyer_id,
            "campaign_data": {
                "appsflyer_id": appsflyer_id,
                "media_source": data.media_source,
                "campaign": data.campaign,
                "sub1": data.af_sub1,
                "sub2": data.af_sub2,
                "sub3": data.af_sub3,
                "sub4": data.af_sub4,
                "sub5": data.af_sub5,
            }
        })))
    }

    /// GET /api/v1/postback/appsflyer: lifecycle events from the tracker,
    /// forwarded to AppsFlyer as S2S in-app events.
    pub async fn postback(
        req: HttpRequest,
        query: web::Query<AppsFlyerPostbackQuery>,
        events: web::Data<EventLog>,
    ) -> Result<HttpResponse> {
        let params = query.into_inner();
        let (Some(appsflyer_id), Some(idfv), Some(event)) = (
            params.appsflyer_id.as_deref().filter(|v| !v.is_empty()),
            params.idfv.as_deref().filter(|v| !v.is_empty()),
            params.event.as_deref().filter(|v| !v.is_empty()),
        ) else {
            return Err(RelayError::validation(
                "Missing required parameters: appsflyer_id, idfv, event",
            ));
        };

        let Some(tenant) = current_tenant(&req) else {
            return Err(RelayError::validation("Tenant not found"));
        };
        let dev_key = tenant
            .appsflyer_dev_key
            .as_deref()
            .filter(|k| !k.is_empty());
        let (true, Some(dev_key)) = (tenant.appsflyer_enabled, dev_key) else {
            return Err(RelayError::validation("AppsFlyer not enabled for this app"));
        };

        let client = AppsFlyerClient::new(dev_key, &tenant.bundle_id, events.get_ref().clone());

        let outcome = match event {
            "registration" => client.send_registration(appsflyer_id, idfv).await,
            "deposit" => {
                let Some(amount) = params.amount.as_deref().and_then(|a| a.parse::<f64>().ok())
                else {
                    return Err(RelayError::validation("Amount required for deposit event"));
                };
                let currency = params.currency.as_deref().unwrap_or("USD");
                client
                    .send_deposit(appsflyer_id, idfv, amount, currency)
                    .await
            }
            _ => {
                return Err(RelayError::validation(
                    "Invalid event type. Use: registration or deposit",
                ));
            }
        };

        match outcome {
            Ok(()) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("AppsFlyer {} event sent successfully", event),
            }))),
            Err(e) => Ok(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": e.to_string(),
            }))),
        }
    }
}
