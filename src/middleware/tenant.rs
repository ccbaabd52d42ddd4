//! Multi-tenant resolution by request hostname.
//!
//! Runs app-wide and never rejects: when the hostname is not registered the
//! request proceeds under a default tenant assembled from environment
//! configuration. Handlers read the resolved tenant from request extensions.

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{Error, HttpMessage, HttpRequest, web};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::storage::{AppTenant, Repository};

pub struct TenantMiddleware;

impl TenantMiddleware {
    pub async fn resolve(
        req: ServiceRequest,
        next: Next<impl MessageBody>,
    ) -> Result<ServiceResponse<impl MessageBody>, Error> {
        if !Self::needs_tenant(req.path()) {
            return next.call(req).await;
        }

        let hostname = Self::hostname(&req);
        let tenant = Self::lookup_with_default(&req, &hostname).await;
        debug!("Tenant resolved: {} -> {}", hostname, tenant.app_id);
        req.extensions_mut().insert(tenant);

        next.call(req).await
    }

    /// Admin and tracker-postback routes operate without a domain tenant.
    /// The AppsFlyer postback is the exception: it needs the tenant's dev
    /// key to reach the S2S API.
    fn needs_tenant(path: &str) -> bool {
        if path == "/health" || path.starts_with("/api/v1/admin") {
            return false;
        }
        if path.starts_with("/api/v1/postback") && !path.starts_with("/api/v1/postback/appsflyer")
        {
            return false;
        }
        true
    }

    fn hostname(req: &ServiceRequest) -> String {
        let info = req.connection_info();
        info.host().split(':').next().unwrap_or_default().to_string()
    }

    async fn lookup_with_default(req: &ServiceRequest, hostname: &str) -> AppTenant {
        if let Some(repository) = req.app_data::<web::Data<Arc<dyn Repository>>>() {
            match repository.find_tenant_by_domain(hostname).await {
                Ok(Some(tenant)) => return tenant,
                Ok(None) => {}
                Err(e) => warn!("Tenant lookup failed for {}: {}", hostname, e),
            }
        }

        let config = req.app_data::<web::Data<AppConfig>>().map(|c| c.as_ref());
        Self::default_tenant(hostname, config)
    }

    /// Fallback for unregistered domains: one process-wide default app
    /// configured through the environment.
    fn default_tenant(hostname: &str, config: Option<&AppConfig>) -> AppTenant {
        AppTenant {
            app_id: "default".to_string(),
            domain: hostname.to_string(),
            team_id: "DEV123".to_string(),
            bundle_id: "com.default.app".to_string(),
            app_name: Some("Default App".to_string()),
            api_key: config
                .map(|c| c.security.api_secret.clone())
                .unwrap_or_default(),
            app_store_url: config.map(|c| c.tenant_defaults.app_store_url.clone()),
            tracker_campaign_url: None,
            appsflyer_dev_key: config.map(|c| c.tenant_defaults.appsflyer_dev_key.clone()),
            appsflyer_enabled: true,
            active: true,
        }
    }
}

/// Tenant resolved for this request, if any.
pub fn current_tenant(req: &HttpRequest) -> Option<AppTenant> {
    req.extensions().get::<AppTenant>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_skip_list_covers_admin_and_tracker_postback() {
        assert!(!TenantMiddleware::needs_tenant("/health"));
        assert!(!TenantMiddleware::needs_tenant("/api/v1/admin/apps"));
        assert!(!TenantMiddleware::needs_tenant("/api/v1/postback"));
        assert!(TenantMiddleware::needs_tenant("/api/v1/postback/appsflyer"));
        assert!(TenantMiddleware::needs_tenant("/api/v1/attribution"));
        assert!(TenantMiddleware::needs_tenant("/t"));
    }
}
