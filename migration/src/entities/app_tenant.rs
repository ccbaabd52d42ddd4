//! App tenant entity: per-customer configuration keyed by inbound domain

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "app_tenants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub app_id: String,
    #[sea_orm(unique)]
    pub domain: String,
    /// Apple Developer Team ID (serves apple-app-site-association)
    pub team_id: String,
    pub bundle_id: String,
    pub app_name: Option<String>,
    #[sea_orm(unique)]
    pub api_key: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub app_store_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub tracker_campaign_url: Option<String>,
    pub appsflyer_dev_key: Option<String>,
    pub appsflyer_enabled: bool,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
