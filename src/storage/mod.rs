use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::error;

use crate::config::DatabaseConfig;
use crate::errors::{RelayError, Result};

pub mod models;
pub mod sea_orm;

pub use models::{
    AppTenant, Attribution, AttributionStats, Click, ClickStats, ErrorLog, NewAttribution,
    NewClick, PostbackLog, PostbackLogEntry, PurgeTarget,
};

/// Data access surface for the relay. The relational store is the single
/// source of truth and the only synchronization point between requests.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // --- clicks ---
    async fn insert_click(&self, click: NewClick) -> Result<()>;
    async fn find_click(&self, click_id: &str) -> Result<Option<Click>>;
    /// Unconsumed clicks from `ip` within the trailing `window`, newest first.
    async fn unconsumed_clicks(&self, ip: &str, window: Duration) -> Result<Vec<Click>>;
    /// Atomic conditional consume: flips `attributed` only if still false.
    /// Returns false when another checkin already claimed the click.
    async fn consume_click(&self, click_id: &str) -> Result<bool>;
    async fn recent_clicks(&self, limit: u64) -> Result<Vec<Click>>;

    // --- attributions ---
    async fn find_attribution(&self, os_user_key: &str) -> Result<Option<Attribution>>;
    /// Idempotent insert keyed by os_user_key; first write wins. Returns the
    /// stored row, which under a race may be the other writer's.
    async fn insert_attribution(&self, attribution: NewAttribution) -> Result<Attribution>;
    /// AppsFlyer path: on conflict the campaign fields are updated in place.
    async fn upsert_appsflyer_attribution(
        &self,
        attribution: NewAttribution,
    ) -> Result<Attribution>;
    async fn attributions_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<u64>;
    async fn recent_attributions(&self, limit: u64) -> Result<Vec<Attribution>>;

    // --- tenants ---
    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<AppTenant>>;
    async fn find_tenant_by_api_key(&self, api_key: &str) -> Result<Option<AppTenant>>;
    async fn find_tenant(&self, app_id: &str) -> Result<Option<AppTenant>>;
    async fn list_tenants(&self) -> Result<Vec<AppTenant>>;
    async fn save_tenant(&self, tenant: AppTenant) -> Result<()>;
    async fn delete_tenant(&self, app_id: &str) -> Result<()>;

    // --- audit logs ---
    async fn log_postback(&self, entry: PostbackLogEntry) -> Result<()>;
    async fn log_error(&self, kind: &str, message: &str, detail: &str) -> Result<()>;
    async fn recent_postback_logs(&self, limit: u64) -> Result<Vec<PostbackLog>>;
    async fn find_postback_log(&self, id: i64) -> Result<Option<PostbackLog>>;
    async fn recent_error_logs(&self, limit: u64) -> Result<Vec<ErrorLog>>;

    // --- stats / maintenance ---
    async fn click_stats(&self) -> Result<ClickStats>;
    async fn attribution_stats(&self) -> Result<AttributionStats>;
    async fn purge(&self, target: PurgeTarget) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
    fn backend_name(&self) -> &str;
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<dyn Repository>> {
        match config.backend.as_str() {
            "sqlite" | "postgres" | "mysql" | "mariadb" => {
                let repository =
                    sea_orm::SeaOrmRepository::new(&config.url, &config.backend).await?;
                Ok(Arc::new(repository) as Arc<dyn Repository>)
            }
            other => {
                error!("Unknown repository backend: {}", other);
                Err(RelayError::database_config(format!(
                    "Unknown repository backend: {}. Supported: sqlite, postgres, mysql, mariadb",
                    other
                )))
            }
        }
    }
}
