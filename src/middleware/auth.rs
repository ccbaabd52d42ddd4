use std::sync::Arc;

use actix_web::middleware::Next;
use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::events::EventLog;
use crate::storage::Repository;
use crate::utils::ip::client_ip_service;

pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Bearer-token guard for the admin API. An empty ADMIN_TOKEN disables
    /// the admin surface entirely.
    pub async fn admin_auth(
        req: ServiceRequest,
        next: Next<BoxBody>,
    ) -> Result<ServiceResponse<BoxBody>, Error> {
        if req.method() == actix_web::http::Method::OPTIONS {
            return Ok(req.into_response(HttpResponse::NoContent().finish()));
        }

        let admin_token = req
            .app_data::<web::Data<AppConfig>>()
            .map(|config| config.security.admin_token.clone())
            .unwrap_or_default();

        if admin_token.is_empty() {
            return Ok(req.into_response(
                HttpResponse::NotFound()
                    .insert_header(("Content-Type", "text/html; charset=utf-8"))
                    .body("Not Found"),
            ));
        }

        if let Some(auth_header) = req.headers().get("Authorization") {
            if let Some(auth_bytes) = auth_header.as_bytes().strip_prefix(b"Bearer ") {
                if auth_bytes == admin_token.as_bytes() {
                    debug!("Admin API authentication succeeded");
                    return next.call(req).await;
                }
            }
        }

        info!("Admin API authentication failed: token mismatch or missing Authorization header");
        Ok(req.into_response(
            HttpResponse::Unauthorized().json(json!({
                "error": "Unauthorized: Invalid or missing token"
            })),
        ))
    }

    /// Per-tenant API key guard for the SDK-facing attribution endpoints.
    /// The key arrives in the `x-api-key` header and must match an active
    /// tenant row.
    pub async fn api_key_auth(
        req: ServiceRequest,
        next: Next<BoxBody>,
    ) -> Result<ServiceResponse<BoxBody>, Error> {
        let api_key = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if api_key.is_empty() {
            return Ok(req.into_response(
                HttpResponse::Unauthorized().json(json!({ "error": "API key required" })),
            ));
        }

        let Some(repository) = req
            .app_data::<web::Data<Arc<dyn Repository>>>()
            .cloned()
        else {
            return Ok(req.into_response(
                HttpResponse::InternalServerError()
                    .json(json!({ "error": "Internal server error" })),
            ));
        };

        match repository.find_tenant_by_api_key(&api_key).await {
            Ok(Some(tenant)) => {
                debug!("API key accepted for tenant {}", tenant.app_id);
                next.call(req).await
            }
            Ok(None) => {
                let preview: String = api_key.chars().take(10).collect();
                warn!("Invalid API key attempt: {}...", preview);
                if let Some(events) = req.app_data::<web::Data<EventLog>>() {
                    events.record_error(
                        "auth",
                        "Authentication Failed: Invalid API Key",
                        json!({
                            "api_key": format!("{}...", preview),
                            "ip": client_ip_service(&req),
                            "path": req.path(),
                        }),
                    );
                }
                Ok(req.into_response(
                    HttpResponse::Forbidden().json(json!({ "error": "Invalid API key" })),
                ))
            }
            Err(e) => {
                warn!("API key validation error: {}", e);
                Ok(req.into_response(
                    HttpResponse::InternalServerError()
                        .json(json!({ "error": "Internal server error" })),
                ))
            }
        }
    }
}
