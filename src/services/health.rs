//! Liveness endpoint.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use crate::storage::Repository;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Called once at startup so /health can report uptime.
pub fn mark_started() {
    START_TIME.get_or_init(Instant::now);
}

pub struct HealthService;

impl HealthService {
    /// GET /health
    pub async fn health(repository: web::Data<Arc<dyn Repository>>) -> HttpResponse {
        let database = match repository.ping().await {
            Ok(()) => "ok",
            Err(_) => "error",
        };
        let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

        let body = json!({
            "status": if database == "ok" { "ok" } else { "degraded" },
            "timestamp": Utc::now().to_rfc3339(),
            "uptime_seconds": uptime,
            "database": database,
            "backend": repository.backend_name(),
        });

        if database == "ok" {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }
}
