//! Attribution entity: the matched-or-organic install outcome per device

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "attributions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Deterministic hash of the device identifier, unique per device
    #[sea_orm(unique)]
    pub os_user_key: String,
    /// Null means organic (no matching click)
    pub click_id: Option<String>,
    pub app_id: Option<String>,
    pub ip_address: String,
    #[sea_orm(column_type = "Text")]
    pub user_agent: String,
    pub idfa: Option<String>,
    pub idfv: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub push_sub: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub final_url: Option<String>,
    pub attribution_source: String,
    pub appsflyer_id: Option<String>,
    pub media_source: Option<String>,
    pub campaign: Option<String>,
    pub af_sub1: Option<String>,
    pub af_sub2: Option<String>,
    pub af_sub3: Option<String>,
    pub af_sub4: Option<String>,
    pub af_sub5: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
