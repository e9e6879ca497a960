//! Migration to create the balances table (per-user, per-asset ledger)

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(string(Balances::UserId).not_null())
                    .col(string(Balances::Asset).not_null())
                    .col(
                        decimal_len(Balances::Amount, 28, 8)
                            .check(Expr::col(Balances::Amount).gte(0)),
                    )
                    .col(
                        decimal_len(Balances::AverageBuyPrice, 28, 8)
                            .check(Expr::col(Balances::AverageBuyPrice).gte(0)),
                    )
                    .col(
                        timestamp_with_time_zone(Balances::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    // One row per (user, asset); upserts conflict on this key
                    .primary_key(
                        Index::create()
                            .name("pk_balances_user_asset")
                            .col(Balances::UserId)
                            .col(Balances::Asset),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Balances {
    Table,
    UserId,
    Asset,
    Amount,
    AverageBuyPrice,
    UpdatedAt,
}
