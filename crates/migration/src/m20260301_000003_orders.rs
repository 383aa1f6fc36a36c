use sea_orm_migration::prelude::*;

use crate::m20260301_000001_users::Users;
use crate::m20260301_000002_study_resources::StudyResources;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // `order_id` is the idempotency key for capture, webhook and checkout writes.
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::OrderId).string().not_null().unique_key())
                    .col(ColumnDef::new(Orders::UserId).integer())
                    .col(ColumnDef::new(Orders::UserEmail).string().not_null())
                    .col(ColumnDef::new(Orders::UserName).string().not_null())
                    .col(
                        ColumnDef::new(Orders::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Orders::PaymentMethod).string().not_null())
                    .col(ColumnDef::new(Orders::TransactionId).string())
                    .col(ColumnDef::new(Orders::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_user_id")
                            .from(Orders::Table, Orders::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_user_id")
                    .table(Orders::Table)
                    .col(Orders::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrderItems::OrderId).string().not_null())
                    .col(ColumnDef::new(OrderItems::StudyResourceId).integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(OrderItems::UnitPriceCents).big_integer().not_null())
                    .col(ColumnDef::new(OrderItems::TotalCents).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order_id")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::OrderId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_study_resource_id")
                            .from(OrderItems::Table, OrderItems::StudyResourceId)
                            .to(StudyResources::Table, StudyResources::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_items_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_items_study_resource_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::StudyResourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserStudyResources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserStudyResources::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UserStudyResources::StudyResourceId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserStudyResources::PurchaseDate)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserStudyResources::OrderId).string())
                    .col(
                        ColumnDef::new(UserStudyResources::Status)
                            .string()
                            .not_null()
                            .default("PAID"),
                    )
                    .col(ColumnDef::new(UserStudyResources::TransactionId).string())
                    .primary_key(
                        Index::create()
                            .col(UserStudyResources::UserId)
                            .col(UserStudyResources::StudyResourceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_study_resources_user_id")
                            .from(UserStudyResources::Table, UserStudyResources::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_study_resources_study_resource_id")
                            .from(
                                UserStudyResources::Table,
                                UserStudyResources::StudyResourceId,
                            )
                            .to(StudyResources::Table, StudyResources::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_study_resources_order_id")
                    .table(UserStudyResources::Table)
                    .col(UserStudyResources::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_user_study_resources_order_id",
            "idx_order_items_study_resource_id",
            "idx_order_items_order_id",
            "idx_orders_user_id",
        ] {
            let _ = manager.drop_index(Index::drop().name(name).to_owned()).await;
        }

        manager
            .drop_table(Table::drop().table(UserStudyResources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    OrderId,
    UserId,
    UserEmail,
    UserName,
    TotalCents,
    Status,
    PaymentMethod,
    TransactionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    StudyResourceId,
    Quantity,
    UnitPriceCents,
    TotalCents,
}

#[derive(DeriveIden)]
enum UserStudyResources {
    Table,
    UserId,
    StudyResourceId,
    PurchaseDate,
    OrderId,
    Status,
    TransactionId,
}
