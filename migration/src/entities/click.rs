//! Click entity: one recorded ad-network redirect hit

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "clicks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub click_id: String,
    pub app_id: Option<String>,
    pub ip_address: String,
    #[sea_orm(column_type = "Text")]
    pub user_agent: String,
    pub fbclid: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub sub3: Option<String>,
    pub sub4: Option<String>,
    pub sub5: Option<String>,
    pub adsetid: Option<String>,
    /// Facebook pixel id carried on the click, if the buyer supplied one
    pub fb_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub fb_token: Option<String>,
    pub attributed: bool,
    pub attributed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
