use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Chart documents keyed by a small fixed set of names
        // (dashboard, faucets, transactions, users, claims, last_updated,
        // update_status); at most one row per key.
        manager
            .create_table(
                Table::create()
                    .table(AnalyticsCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalyticsCache::CacheKey)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsCache::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalyticsCache::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalyticsCache::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AnalyticsCache {
    Table,
    CacheKey,
    Payload,
    UpdatedAt,
}
