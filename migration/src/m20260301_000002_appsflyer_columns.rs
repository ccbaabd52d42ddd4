use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Adds the AppsFlyer attribution-source columns to `attributions`.
/// Kept additive: older rows keep the 'facebook' default.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Attribution::Table)
                    .add_column_if_not_exists(
                        ColumnDef::new(Attribution::AttributionSource)
                            .string()
                            .not_null()
                            .default("facebook"),
                    )
                    .to_owned(),
            )
            .await?;

        for col in [
            Attribution::AppsflyerId,
            Attribution::MediaSource,
            Attribution::Campaign,
            Attribution::AfSub1,
            Attribution::AfSub2,
            Attribution::AfSub3,
            Attribution::AfSub4,
            Attribution::AfSub5,
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Attribution::Table)
                        .add_column_if_not_exists(ColumnDef::new(col).string().null())
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for col in [
            Attribution::AfSub5,
            Attribution::AfSub4,
            Attribution::AfSub3,
            Attribution::AfSub2,
            Attribution::AfSub1,
            Attribution::Campaign,
            Attribution::MediaSource,
            Attribution::AppsflyerId,
            Attribution::AttributionSource,
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Attribution::Table)
                        .drop_column(col)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Attribution {
    #[sea_orm(iden = "attributions")]
    Table,
    AttributionSource,
    AppsflyerId,
    MediaSource,
    Campaign,
    AfSub1,
    AfSub2,
    AfSub3,
    AfSub4,
    AfSub5,
}
