//! Admin API: tenant CRUD, dashboard feeds, audit log management.
//!
//! The whole scope sits behind the bearer-token guard; an empty ADMIN_TOKEN
//! disables it.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::errors::{RelayError, Result};
use crate::events::EventLog;
use crate::outbound::facebook::FacebookClient;
use crate::storage::{AppTenant, PostbackLogEntry, PurgeTarget, Repository};
use crate::utils::generate_api_key;

#[derive(Debug, Deserialize)]
pub struct TenantPayload {
    pub app_id: Option<String>,
    pub domain: Option<String>,
    pub team_id: Option<String>,
    pub bundle_id: Option<String>,
    pub app_name: Option<String>,
    pub app_store_url: Option<String>,
    pub tracker_campaign_url: Option<String>,
    pub appsflyer_dev_key: Option<String>,
    pub appsflyer_enabled: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    pub since: Option<i64>,
}

pub struct AdminService;

impl AdminService {
    /// GET /api/v1/admin/apps
    pub async fn list_apps(repository: web::Data<Arc<dyn Repository>>) -> Result<HttpResponse> {
        let apps = repository.list_tenants().await?;
        Ok(HttpResponse::Ok().json(json!({ "success": true, "apps": apps })))
    }

    /// POST /api/v1/admin/apps: creates a tenant with a freshly generated
    /// API key.
    pub async fn create_app(
        body: web::Json<TenantPayload>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let payload = body.into_inner();
        let (Some(app_id), Some(domain), Some(team_id), Some(bundle_id), Some(app_name)) = (
            payload.app_id.filter(|v| !v.is_empty()),
            payload.domain.filter(|v| !v.is_empty()),
            payload.team_id.filter(|v| !v.is_empty()),
            payload.bundle_id.filter(|v| !v.is_empty()),
            payload.app_name.filter(|v| !v.is_empty()),
        ) else {
            return Err(RelayError::validation("Missing required fields"));
        };

        if repository.find_tenant(&app_id).await?.is_some() {
            return Err(RelayError::validation("App ID already exists"));
        }

        let tenant = AppTenant {
            app_id,
            domain,
            team_id,
            bundle_id,
            app_name: Some(app_name),
            api_key: generate_api_key(),
            app_store_url: payload.app_store_url,
            tracker_campaign_url: payload.tracker_campaign_url,
            appsflyer_dev_key: payload.appsflyer_dev_key,
            appsflyer_enabled: payload.appsflyer_enabled.unwrap_or(false),
            active: payload.active.unwrap_or(true),
        };
        repository.save_tenant(tenant.clone()).await?;
        info!("App created: {}", tenant.app_id);

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "app": tenant,
            "message": "App created successfully",
        })))
    }

    /// PUT /api/v1/admin/apps/{app_id}: partial update, API key preserved.
    pub async fn update_app(
        path: web::Path<String>,
        body: web::Json<TenantPayload>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let app_id = path.into_inner();
        let Some(mut tenant) = repository.find_tenant(&app_id).await? else {
            return Err(RelayError::not_found("App not found"));
        };

        let payload = body.into_inner();
        if let Some(domain) = payload.domain {
            tenant.domain = domain;
        }
        if let Some(team_id) = payload.team_id {
            tenant.team_id = team_id;
        }
        if let Some(bundle_id) = payload.bundle_id {
            tenant.bundle_id = bundle_id;
        }
        if let Some(app_name) = payload.app_name {
            tenant.app_name = Some(app_name);
        }
        if let Some(app_store_url) = payload.app_store_url {
            tenant.app_store_url = Some(app_store_url);
        }
        if let Some(tracker_campaign_url) = payload.tracker_campaign_url {
            tenant.tracker_campaign_url = Some(tracker_campaign_url);
        }
        if let Some(appsflyer_dev_key) = payload.appsflyer_dev_key {
            tenant.appsflyer_dev_key = Some(appsflyer_dev_key);
        }
        if let Some(appsflyer_enabled) = payload.appsflyer_enabled {
            tenant.appsflyer_enabled = appsflyer_enabled;
        }
        if let Some(active) = payload.active {
            tenant.active = active;
        }

        repository.save_tenant(tenant.clone()).await?;
        info!("App updated: {}", tenant.app_id);

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "app": tenant,
            "message": "App updated successfully",
        })))
    }

    /// DELETE /api/v1/admin/apps/{app_id}
    pub async fn delete_app(
        path: web::Path<String>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        repository.delete_tenant(&path.into_inner()).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "App deleted successfully",
        })))
    }

    /// GET /api/v1/admin/clicks?limit=20
    pub async fn recent_clicks(
        query: web::Query<LimitQuery>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let clicks = repository.recent_clicks(query.limit.unwrap_or(20)).await?;
        let count = clicks.len();
        Ok(HttpResponse::Ok().json(json!({ "clicks": clicks, "count": count })))
    }

    /// GET /api/v1/admin/click/{click_id}
    pub async fn click_by_id(
        path: web::Path<String>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        match repository.find_click(&path.into_inner()).await? {
            Some(click) => Ok(HttpResponse::Ok().json(click)),
            None => Err(RelayError::not_found("Click not found")),
        }
    }

    /// GET /api/v1/admin/attributions?limit=20
    pub async fn recent_attributions(
        query: web::Query<LimitQuery>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let attributions = repository
            .recent_attributions(query.limit.unwrap_or(20))
            .await?;
        let count = attributions.len();
        Ok(HttpResponse::Ok().json(json!({
            "attributions": attributions,
            "count": count,
        })))
    }

    /// GET /api/v1/admin/events?since=<millis>, the live in-memory feed.
    pub async fn events(
        query: web::Query<SinceQuery>,
        events: web::Data<EventLog>,
    ) -> Result<HttpResponse> {
        Ok(HttpResponse::Ok().json(json!({ "events": events.recent(query.since) })))
    }

    /// GET /api/v1/admin/logs/postbacks?limit=50
    pub async fn postback_logs(
        query: web::Query<LimitQuery>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let logs = repository
            .recent_postback_logs(query.limit.unwrap_or(50))
            .await?;
        Ok(HttpResponse::Ok().json(json!({ "logs": logs })))
    }

    /// DELETE /api/v1/admin/logs/postbacks
    pub async fn clear_postback_logs(
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        repository.purge(PurgeTarget::PostbackLogs).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Postback logs cleared",
        })))
    }

    /// GET /api/v1/admin/logs/errors?limit=50
    pub async fn error_logs(
        query: web::Query<LimitQuery>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let logs = repository
            .recent_error_logs(query.limit.unwrap_or(50))
            .await?;
        Ok(HttpResponse::Ok().json(json!({ "logs": logs })))
    }

    /// DELETE /api/v1/admin/logs/errors
    pub async fn clear_error_logs(
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        repository.purge(PurgeTarget::ErrorLogs).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Error logs cleared",
        })))
    }

    /// POST /api/v1/admin/logs/postbacks/{id}/resend: replays a stored
    /// outbound postback against its original URL.
    pub async fn resend_postback(
        path: web::Path<i64>,
        repository: web::Data<Arc<dyn Repository>>,
        events: web::Data<EventLog>,
    ) -> Result<HttpResponse> {
        let id = path.into_inner();
        let Some(log) = repository.find_postback_log(id).await? else {
            return Err(RelayError::not_found("Postback log not found"));
        };
        let Some(url) = log.url.clone().filter(|u| u.starts_with("http")) else {
            return Err(RelayError::validation(
                "Stored postback has no replayable URL",
            ));
        };
        let payload: Value = log
            .payload
            .as_deref()
            .and_then(|p| serde_json::from_str(p).ok())
            .unwrap_or(Value::Null);

        let request_url = url.clone();
        let request_payload = payload.clone();
        let outcome =
            tokio::task::spawn_blocking(move || {
                FacebookClient::post_sync(&request_url, &request_payload)
            })
            .await
            .unwrap_or_else(|e| Err(format!("resend task failed: {}", e)));

        let (status, body) = match outcome {
            Ok((status, body)) => (status as i32, body),
            Err(message) => (500, Value::String(message)),
        };

        events.record_postback(
            format!("Manual resend of postback #{}", id),
            PostbackLogEntry {
                click_id: log.click_id.clone(),
                url,
                method: "POST".to_string(),
                payload,
                response_status: status,
                response_body: body.clone(),
            },
        );

        Ok(HttpResponse::Ok().json(json!({
            "success": status < 400,
            "resent": id,
            "response_status": status,
            "response_body": body,
        })))
    }

    /// DELETE /api/v1/admin/purge/{target}
    pub async fn purge(
        path: web::Path<String>,
        repository: web::Data<Arc<dyn Repository>>,
    ) -> Result<HttpResponse> {
        let target = match path.as_str() {
            "clicks" => PurgeTarget::Clicks,
            "attributions" => PurgeTarget::Attributions,
            "postback_logs" => PurgeTarget::PostbackLogs,
            "error_logs" => PurgeTarget::ErrorLogs,
            other => {
                return Err(RelayError::validation(format!(
                    "Unknown purge target: {}",
                    other
                )));
            }
        };
        let purged = repository.purge(target).await?;
        Ok(HttpResponse::Ok().json(json!({ "success": true, "purged": purged })))
    }
}
