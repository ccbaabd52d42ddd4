//! Sea-ORM backed repository (SQLite / PostgreSQL / MySQL).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use tracing::{debug, info, warn};

use migration::entities::{app_tenant, attribution, click, error_log, postback_log};
use migration::{Migrator, MigratorTrait};

use crate::errors::{RelayError, Result};
use crate::storage::models::{
    AppTenant, Attribution, AttributionStats, Click, ClickStats, ErrorLog, NewAttribution,
    NewClick, PostbackLog, PostbackLogEntry, PurgeTarget,
};
use crate::storage::Repository;

#[derive(Clone)]
pub struct SeaOrmRepository {
    db: DatabaseConnection,
    backend_name: String,
}

impl SeaOrmRepository {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(RelayError::database_config("DATABASE_URL is not set"));
        }

        let db = if backend_name == "sqlite" {
            Self::connect_sqlite(database_url).await?
        } else {
            Self::connect_generic(database_url, backend_name).await?
        };

        let repository = SeaOrmRepository {
            db,
            backend_name: backend_name.to_string(),
        };

        repository.run_migrations().await?;

        warn!(
            "{} repository initialized.",
            repository.backend_name.to_uppercase()
        );
        Ok(repository)
    }

    /// Wraps an already-open connection (used by tests).
    pub fn from_connection(db: DatabaseConnection, backend_name: &str) -> Self {
        SeaOrmRepository {
            db,
            backend_name: backend_name.to_string(),
        }
    }

    pub async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::SqlitePool;
        use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RelayError::database_config(format!("bad SQLite URL: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePool::connect_with(opt).await.map_err(|e| {
            RelayError::database_connection(format!("cannot connect to SQLite: {}", e))
        })?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    async fn connect_generic(database_url: &str, backend_name: &str) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(20)
            .min_connections(2)
            .connect_timeout(std::time::Duration::from_secs(8))
            .acquire_timeout(std::time::Duration::from_secs(8))
            .idle_timeout(std::time::Duration::from_secs(30))
            .sqlx_logging(false);

        Database::connect(opt).await.map_err(|e| {
            RelayError::database_connection(format!(
                "cannot connect to {} database: {}",
                backend_name.to_uppercase(),
                e
            ))
        })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        Migrator::up(&self.db, None)
            .await
            .map_err(|e| RelayError::database_operation(format!("migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    fn click_from_model(model: click::Model) -> Click {
        Click {
            click_id: model.click_id,
            app_id: model.app_id,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            fbclid: model.fbclid,
            sub1: model.sub1,
            sub2: model.sub2,
            sub3: model.sub3,
            sub4: model.sub4,
            sub5: model.sub5,
            adsetid: model.adsetid,
            fb_id: model.fb_id,
            fb_token: model.fb_token,
            attributed: model.attributed,
            attributed_at: model.attributed_at,
            created_at: model.created_at,
        }
    }

    fn attribution_from_model(model: attribution::Model) -> Attribution {
        Attribution {
            os_user_key: model.os_user_key,
            click_id: model.click_id,
            app_id: model.app_id,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            idfa: model.idfa,
            idfv: model.idfv,
            device_model: model.device_model,
            os_version: model.os_version,
            app_version: model.app_version,
            push_sub: model.push_sub,
            final_url: model.final_url,
            attribution_source: model.attribution_source,
            appsflyer_id: model.appsflyer_id,
            media_source: model.media_source,
            campaign: model.campaign,
            af_sub1: model.af_sub1,
            af_sub2: model.af_sub2,
            af_sub3: model.af_sub3,
            af_sub4: model.af_sub4,
            af_sub5: model.af_sub5,
            created_at: model.created_at,
        }
    }

    fn attribution_to_active_model(attribution: &NewAttribution) -> attribution::ActiveModel {
        attribution::ActiveModel {
            os_user_key: Set(attribution.os_user_key.clone()),
            click_id: Set(attribution.click_id.clone()),
            app_id: Set(attribution.app_id.clone()),
            ip_address: Set(attribution.ip_address.clone()),
            user_agent: Set(attribution.user_agent.clone()),
            idfa: Set(attribution.idfa.clone()),
            idfv: Set(attribution.idfv.clone()),
            device_model: Set(attribution.device_model.clone()),
            os_version: Set(attribution.os_version.clone()),
            app_version: Set(attribution.app_version.clone()),
            push_sub: Set(attribution.push_sub.clone()),
            final_url: Set(attribution.final_url.clone()),
            attribution_source: Set(attribution.attribution_source.clone()),
            appsflyer_id: Set(attribution.appsflyer_id.clone()),
            media_source: Set(attribution.media_source.clone()),
            campaign: Set(attribution.campaign.clone()),
            af_sub1: Set(attribution.af_sub1.clone()),
            af_sub2: Set(attribution.af_sub2.clone()),
            af_sub3: Set(attribution.af_sub3.clone()),
            af_sub4: Set(attribution.af_sub4.clone()),
            af_sub5: Set(attribution.af_sub5.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    fn tenant_from_model(model: app_tenant::Model) -> AppTenant {
        AppTenant {
            app_id: model.app_id,
            domain: model.domain,
            team_id: model.team_id,
            bundle_id: model.bundle_id,
            app_name: model.app_name,
            api_key: model.api_key,
            app_store_url: model.app_store_url,
            tracker_campaign_url: model.tracker_campaign_url,
            appsflyer_dev_key: model.appsflyer_dev_key,
            appsflyer_enabled: model.appsflyer_enabled,
            active: model.active,
        }
    }
}

#[async_trait]
impl Repository for SeaOrmRepository {
    async fn insert_click(&self, new: NewClick) -> Result<()> {
        let model = click::ActiveModel {
            click_id: Set(new.click_id.clone()),
            app_id: Set(new.app_id),
            ip_address: Set(new.ip_address),
            user_agent: Set(new.user_agent),
            fbclid: Set(new.fbclid),
            sub1: Set(new.sub1),
            sub2: Set(new.sub2),
            sub3: Set(new.sub3),
            sub4: Set(new.sub4),
            sub5: Set(new.sub5),
            adsetid: Set(new.adsetid),
            fb_id: Set(new.fb_id),
            fb_token: Set(new.fb_token),
            attributed: Set(false),
            attributed_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        click::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| {
                RelayError::database_operation(format!("click insert failed: {}", e))
            })?;

        debug!("Click stored: {}", new.click_id);
        Ok(())
    }

    async fn find_click(&self, click_id: &str) -> Result<Option<Click>> {
        let model = click::Entity::find()
            .filter(click::Column::ClickId.eq(click_id))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::click_from_model))
    }

    async fn unconsumed_clicks(&self, ip: &str, window: Duration) -> Result<Vec<Click>> {
        let now = Utc::now();
        let cutoff = now - window;

        let models = click::Entity::find()
            .filter(click::Column::IpAddress.eq(ip))
            .filter(click::Column::Attributed.eq(false))
            .filter(click::Column::CreatedAt.gte(cutoff))
            .filter(click::Column::CreatedAt.lt(now))
            .order_by_desc(click::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Self::click_from_model).collect())
    }

    async fn consume_click(&self, click_id: &str) -> Result<bool> {
        // Conditional update; at most one caller can observe rows_affected=1.
        let result = click::Entity::update_many()
            .col_expr(click::Column::Attributed, Expr::value(true))
            .col_expr(click::Column::AttributedAt, Expr::value(Utc::now()))
            .filter(click::Column::ClickId.eq(click_id))
            .filter(click::Column::Attributed.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn recent_clicks(&self, limit: u64) -> Result<Vec<Click>> {
        let models = click::Entity::find()
            .order_by_desc(click::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Self::click_from_model).collect())
    }

    async fn find_attribution(&self, os_user_key: &str) -> Result<Option<Attribution>> {
        let model = attribution::Entity::find()
            .filter(attribution::Column::OsUserKey.eq(os_user_key))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::attribution_from_model))
    }

    async fn insert_attribution(&self, new: NewAttribution) -> Result<Attribution> {
        let os_user_key = new.os_user_key.clone();
        let model = Self::attribution_to_active_model(&new);

        let insert = attribution::Entity::insert(model)
            .on_conflict(
                OnConflict::column(attribution::Column::OsUserKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await;

        match insert {
            Ok(_) => {}
            // Conflict with an existing row: first write wins, fall through
            // and return whatever is stored.
            Err(sea_orm::DbErr::RecordNotInserted) => {
                debug!("Attribution already present for {}", os_user_key);
            }
            Err(e) => {
                return Err(RelayError::database_operation(format!(
                    "attribution insert failed: {}",
                    e
                )));
            }
        }

        self.find_attribution(&os_user_key).await?.ok_or_else(|| {
            RelayError::database_operation("attribution row missing after insert")
        })
    }

    async fn upsert_appsflyer_attribution(&self, new: NewAttribution) -> Result<Attribution> {
        let os_user_key = new.os_user_key.clone();
        let model = Self::attribution_to_active_model(&new);

        let insert = attribution::Entity::insert(model)
            .on_conflict(
                OnConflict::column(attribution::Column::OsUserKey)
                    .update_columns([
                        attribution::Column::AppsflyerId,
                        attribution::Column::MediaSource,
                        attribution::Column::Campaign,
                        attribution::Column::PushSub,
                        attribution::Column::FinalUrl,
                        attribution::Column::AfSub1,
                        attribution::Column::AfSub2,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await;

        match insert {
            Ok(_) | Err(sea_orm::DbErr::RecordNotInserted) => {}
            Err(e) => {
                return Err(RelayError::database_operation(format!(
                    "appsflyer attribution upsert failed: {}",
                    e
                )));
            }
        }

        self.find_attribution(&os_user_key).await?.ok_or_else(|| {
            RelayError::database_operation("attribution row missing after upsert")
        })
    }

    async fn attributions_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<u64> {
        let count = attribution::Entity::find()
            .filter(attribution::Column::IpAddress.eq(ip))
            .filter(attribution::Column::CreatedAt.gte(since))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn recent_attributions(&self, limit: u64) -> Result<Vec<Attribution>> {
        let models = attribution::Entity::find()
            .order_by_desc(attribution::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(Self::attribution_from_model)
            .collect())
    }

    async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<AppTenant>> {
        let model = app_tenant::Entity::find()
            .filter(app_tenant::Column::Domain.eq(domain))
            .filter(app_tenant::Column::Active.eq(true))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::tenant_from_model))
    }

    async fn find_tenant_by_api_key(&self, api_key: &str) -> Result<Option<AppTenant>> {
        let model = app_tenant::Entity::find()
            .filter(app_tenant::Column::ApiKey.eq(api_key))
            .filter(app_tenant::Column::Active.eq(true))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::tenant_from_model))
    }

    async fn find_tenant(&self, app_id: &str) -> Result<Option<AppTenant>> {
        let model = app_tenant::Entity::find()
            .filter(app_tenant::Column::AppId.eq(app_id))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::tenant_from_model))
    }

    async fn list_tenants(&self) -> Result<Vec<AppTenant>> {
        let models = app_tenant::Entity::find()
            .order_by_asc(app_tenant::Column::AppId)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Self::tenant_from_model).collect())
    }

    async fn save_tenant(&self, tenant: AppTenant) -> Result<()> {
        let model = app_tenant::ActiveModel {
            app_id: Set(tenant.app_id.clone()),
            domain: Set(tenant.domain),
            team_id: Set(tenant.team_id),
            bundle_id: Set(tenant.bundle_id),
            app_name: Set(tenant.app_name),
            api_key: Set(tenant.api_key),
            app_store_url: Set(tenant.app_store_url),
            tracker_campaign_url: Set(tenant.tracker_campaign_url),
            appsflyer_dev_key: Set(tenant.appsflyer_dev_key),
            appsflyer_enabled: Set(tenant.appsflyer_enabled),
            active: Set(tenant.active),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        app_tenant::Entity::insert(model)
            .on_conflict(
                OnConflict::column(app_tenant::Column::AppId)
                    .update_columns([
                        app_tenant::Column::Domain,
                        app_tenant::Column::TeamId,
                        app_tenant::Column::BundleId,
                        app_tenant::Column::AppName,
                        app_tenant::Column::ApiKey,
                        app_tenant::Column::AppStoreUrl,
                        app_tenant::Column::TrackerCampaignUrl,
                        app_tenant::Column::AppsflyerDevKey,
                        app_tenant::Column::AppsflyerEnabled,
                        app_tenant::Column::Active,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| RelayError::database_operation(format!("tenant upsert failed: {}", e)))?;

        info!("Tenant saved: {}", tenant.app_id);
        Ok(())
    }

    async fn delete_tenant(&self, app_id: &str) -> Result<()> {
        let result = app_tenant::Entity::delete_many()
            .filter(app_tenant::Column::AppId.eq(app_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RelayError::not_found(format!("unknown tenant: {}", app_id)));
        }
        info!("Tenant deleted: {}", app_id);
        Ok(())
    }

    async fn log_postback(&self, entry: PostbackLogEntry) -> Result<()> {
        let model = postback_log::ActiveModel {
            click_id: Set(entry.click_id),
            url: Set(Some(entry.url)),
            method: Set(Some(entry.method)),
            payload: Set(Some(entry.payload.to_string())),
            response_status: Set(Some(entry.response_status)),
            response_body: Set(Some(entry.response_body.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        postback_log::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| {
                RelayError::database_operation(format!("postback log insert failed: {}", e))
            })?;
        Ok(())
    }

    async fn log_error(&self, kind: &str, message: &str, detail: &str) -> Result<()> {
        let model = error_log::ActiveModel {
            kind: Set(Some(kind.to_string())),
            message: Set(Some(message.to_string())),
            detail: Set(Some(detail.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        error_log::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| {
                RelayError::database_operation(format!("error log insert failed: {}", e))
            })?;
        Ok(())
    }

    async fn recent_postback_logs(&self, limit: u64) -> Result<Vec<PostbackLog>> {
        let models = postback_log::Entity::find()
            .order_by_desc(postback_log::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| PostbackLog {
                id: m.id,
                click_id: m.click_id,
                url: m.url,
                method: m.method,
                payload: m.payload,
                response_status: m.response_status,
                response_body: m.response_body,
                created_at: m.created_at,
            })
            .collect())
    }

    async fn find_postback_log(&self, id: i64) -> Result<Option<PostbackLog>> {
        let model = postback_log::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(|m| PostbackLog {
            id: m.id,
            click_id: m.click_id,
            url: m.url,
            method: m.method,
            payload: m.payload,
            response_status: m.response_status,
            response_body: m.response_body,
            created_at: m.created_at,
        }))
    }

    async fn recent_error_logs(&self, limit: u64) -> Result<Vec<ErrorLog>> {
        let models = error_log::Entity::find()
            .order_by_desc(error_log::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| ErrorLog {
                id: m.id,
                kind: m.kind,
                message: m.message,
                detail: m.detail,
                created_at: m.created_at,
            })
            .collect())
    }

    async fn click_stats(&self) -> Result<ClickStats> {
        let total = click::Entity::find().count(&self.db).await?;
        let attributed = click::Entity::find()
            .filter(click::Column::Attributed.eq(true))
            .count(&self.db)
            .await?;
        let last_24h = click::Entity::find()
            .filter(click::Column::CreatedAt.gte(Utc::now() - Duration::hours(24)))
            .count(&self.db)
            .await?;

        Ok(ClickStats {
            total_clicks: total,
            attributed_clicks: attributed,
            clicks_last_24h: last_24h,
        })
    }

    async fn attribution_stats(&self) -> Result<AttributionStats> {
        let total = attribution::Entity::find().count(&self.db).await?;
        let attributed = attribution::Entity::find()
            .filter(attribution::Column::ClickId.is_not_null())
            .count(&self.db)
            .await?;

        Ok(AttributionStats {
            total_attributions: total,
            attributed_installs: attributed,
            organic_installs: total.saturating_sub(attributed),
        })
    }

    async fn purge(&self, target: PurgeTarget) -> Result<u64> {
        let rows = match target {
            PurgeTarget::Clicks => click::Entity::delete_many().exec(&self.db).await?,
            PurgeTarget::Attributions => attribution::Entity::delete_many().exec(&self.db).await?,
            PurgeTarget::PostbackLogs => postback_log::Entity::delete_many().exec(&self.db).await?,
            PurgeTarget::ErrorLogs => error_log::Entity::delete_many().exec(&self.db).await?,
        };

        warn!("Purged {} rows from {:?}", rows.rows_affected, target);
        Ok(rows.rows_affected)
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| RelayError::database_connection(e.to_string()))
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}
