use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One secret code per faucet; the faucet address (EIP-55 checksummed)
        // is the primary key so upserts replace in place.
        manager
            .create_table(
                Table::create()
                    .table(DropCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DropCodes::FaucetAddress)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DropCodes::Code).string_len(6).not_null())
                    .col(
                        ColumnDef::new(DropCodes::StartTime)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DropCodes::EndTime).big_integer().not_null())
                    .col(
                        ColumnDef::new(DropCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("idx_drop_codes_window")
                            .col(DropCodes::StartTime)
                            .col(DropCodes::EndTime),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-(user, faucet) admin popup suppression flag
        manager
            .create_table(
                Table::create()
                    .table(PopupPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PopupPreferences::UserAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PopupPreferences::FaucetAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PopupPreferences::DontShowAdminPopup)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PopupPreferences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_popup_preferences")
                            .col(PopupPreferences::UserAddress)
                            .col(PopupPreferences::FaucetAddress),
                    )
                    .index(
                        Index::create()
                            .name("idx_popup_preferences_user")
                            .col(PopupPreferences::UserAddress),
                    )
                    .to_owned(),
            )
            .await?;

        // Opaque task documents attached by set-claim-parameters; consumed by
        // the quest service, never read back here.
        manager
            .create_table(
                Table::create()
                    .table(QuestTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestTasks::FaucetAddress)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuestTasks::Tasks).json_binary().not_null())
                    .col(
                        ColumnDef::new(QuestTasks::UpdatedAt)
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
            .drop_table(Table::drop().table(QuestTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PopupPreferences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DropCodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DropCodes {
    Table,
    FaucetAddress,
    Code,
    StartTime,
    EndTime,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PopupPreferences {
    Table,
    UserAddress,
    FaucetAddress,
    DontShowAdminPopup,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QuestTasks {
    Table,
    FaucetAddress,
    Tasks,
    UpdatedAt,
}
