//! Migration to create the transactions table for deposit/withdrawal requests

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(string(Transactions::Id).primary_key())
                    .col(string(Transactions::UserId).not_null())
                    .col(string(Transactions::Kind).not_null())
                    .col(string(Transactions::Asset).not_null())
                    .col(
                        decimal_len(Transactions::CryptoAmount, 28, 8)
                            .check(Expr::col(Transactions::CryptoAmount).gt(0)),
                    )
                    .col(
                        decimal_len(Transactions::UsdValue, 20, 2)
                            .check(Expr::col(Transactions::UsdValue).gt(0)),
                    )
                    .col(string(Transactions::Status).not_null())
                    .col(string(Transactions::PaymentProofRef).not_null())
                    .col(text_null(Transactions::AdminNotes))
                    .col(string_null(Transactions::ApprovedBy))
                    .col(timestamp_with_time_zone_null(Transactions::ApprovedAt))
                    .col(
                        timestamp_with_time_zone(Transactions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // User history
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_id")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .to_owned(),
            )
            .await?;

        // Admin review queue
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_status")
                    .table(Transactions::Table)
                    .col(Transactions::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    Asset,
    CryptoAmount,
    UsdValue,
    Status,
    PaymentProofRef,
    AdminNotes,
    ApprovedBy,
    ApprovedAt,
    CreatedAt,
}
