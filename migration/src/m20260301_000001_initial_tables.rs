use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // clicks: one row per inbound ad click
        manager
            .create_table(
                Table::create()
                    .table(Click::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Click::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Click::ClickId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Click::AppId).string().null())
                    .col(ColumnDef::new(Click::IpAddress).string().not_null())
                    .col(ColumnDef::new(Click::UserAgent).text().not_null())
                    .col(ColumnDef::new(Click::Fbclid).string().null())
                    .col(ColumnDef::new(Click::Sub1).string().null())
                    .col(ColumnDef::new(Click::Sub2).string().null())
                    .col(ColumnDef::new(Click::Sub3).string().null())
                    .col(ColumnDef::new(Click::Sub4).string().null())
                    .col(ColumnDef::new(Click::Sub5).string().null())
                    .col(ColumnDef::new(Click::Adsetid).string().null())
                    .col(ColumnDef::new(Click::FbId).string().null())
                    .col(ColumnDef::new(Click::FbToken).text().null())
                    .col(
                        ColumnDef::new(Click::Attributed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Click::AttributedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Click::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // candidate search scans (ip_address, created_at)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clicks_ip_created")
                    .table(Click::Table)
                    .col(Click::IpAddress)
                    .col(Click::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clicks_created_at")
                    .table(Click::Table)
                    .col(Click::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // attributions: the matched-or-organic install outcome per device
        manager
            .create_table(
                Table::create()
                    .table(Attribution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attribution::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Attribution::OsUserKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Attribution::ClickId).string().null())
                    .col(ColumnDef::new(Attribution::AppId).string().null())
                    .col(ColumnDef::new(Attribution::IpAddress).string().not_null())
                    .col(ColumnDef::new(Attribution::UserAgent).text().not_null())
                    .col(ColumnDef::new(Attribution::Idfa).string().null())
                    .col(ColumnDef::new(Attribution::Idfv).string().null())
                    .col(ColumnDef::new(Attribution::DeviceModel).string().null())
                    .col(ColumnDef::new(Attribution::OsVersion).string().null())
                    .col(ColumnDef::new(Attribution::AppVersion).string().null())
                    .col(ColumnDef::new(Attribution::PushSub).string().null())
                    .col(ColumnDef::new(Attribution::FinalUrl).text().null())
                    .col(
                        ColumnDef::new(Attribution::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_attributions_click_id")
                    .table(Attribution::Table)
                    .col(Attribution::ClickId)
                    .to_owned(),
            )
            .await?;

        // ip-velocity fraud heuristic scans (ip_address, created_at)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_attributions_ip_created")
                    .table(Attribution::Table)
                    .col(Attribution::IpAddress)
                    .col(Attribution::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // app_tenants: per-customer configuration, looked up by domain
        manager
            .create_table(
                Table::create()
                    .table(AppTenant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppTenant::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AppTenant::AppId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AppTenant::Domain)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppTenant::TeamId).string().not_null())
                    .col(ColumnDef::new(AppTenant::BundleId).string().not_null())
                    .col(ColumnDef::new(AppTenant::AppName).string().null())
                    .col(
                        ColumnDef::new(AppTenant::ApiKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppTenant::AppStoreUrl).text().null())
                    .col(ColumnDef::new(AppTenant::TrackerCampaignUrl).text().null())
                    .col(ColumnDef::new(AppTenant::AppsflyerDevKey).string().null())
                    .col(
                        ColumnDef::new(AppTenant::AppsflyerEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppTenant::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AppTenant::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // postback_logs: audit trail for every inbound/outbound postback
        manager
            .create_table(
                Table::create()
                    .table(PostbackLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostbackLog::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostbackLog::ClickId).string().null())
                    .col(ColumnDef::new(PostbackLog::Url).text().null())
                    .col(ColumnDef::new(PostbackLog::Method).string().null())
                    .col(ColumnDef::new(PostbackLog::Payload).text().null())
                    .col(ColumnDef::new(PostbackLog::ResponseStatus).integer().null())
                    .col(ColumnDef::new(PostbackLog::ResponseBody).text().null())
                    .col(
                        ColumnDef::new(PostbackLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_postback_logs_created")
                    .table(PostbackLog::Table)
                    .col(PostbackLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // error_logs: append-only record of notable failures
        manager
            .create_table(
                Table::create()
                    .table(ErrorLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErrorLog::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErrorLog::Kind).string().null())
                    .col(ColumnDef::new(ErrorLog::Message).text().null())
                    .col(ColumnDef::new(ErrorLog::Detail).text().null())
                    .col(
                        ColumnDef::new(ErrorLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_error_logs_created")
                    .table(ErrorLog::Table)
                    .col(ErrorLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ErrorLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PostbackLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppTenant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Attribution::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Click::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Click {
    #[sea_orm(iden = "clicks")]
    Table,
    Id,
    ClickId,
    AppId,
    IpAddress,
    UserAgent,
    Fbclid,
    Sub1,
    Sub2,
    Sub3,
    Sub4,
    Sub5,
    Adsetid,
    FbId,
    FbToken,
    Attributed,
    AttributedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Attribution {
    #[sea_orm(iden = "attributions")]
    Table,
    Id,
    OsUserKey,
    ClickId,
    AppId,
    IpAddress,
    UserAgent,
    Idfa,
    Idfv,
    DeviceModel,
    OsVersion,
    AppVersion,
    PushSub,
    FinalUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AppTenant {
    #[sea_orm(iden = "app_tenants")]
    Table,
    Id,
    AppId,
    Domain,
    TeamId,
    BundleId,
    AppName,
    ApiKey,
    AppStoreUrl,
    TrackerCampaignUrl,
    AppsflyerDevKey,
    AppsflyerEnabled,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PostbackLog {
    #[sea_orm(iden = "postback_logs")]
    Table,
    Id,
    ClickId,
    Url,
    Method,
    Payload,
    ResponseStatus,
    ResponseBody,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ErrorLog {
    #[sea_orm(iden = "error_logs")]
    Table,
    Id,
    Kind,
    Message,
    Detail,
    CreatedAt,
}
