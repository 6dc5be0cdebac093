use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_inventory_tables::InventoryItems;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quotes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Quotes::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Quotes::Name).string().not_null())
                    .col(ColumnDef::new(Quotes::CustomerName).string().null())
                    .col(ColumnDef::new(Quotes::StartDate).date().not_null())
                    .col(ColumnDef::new(Quotes::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(Quotes::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Quotes::EventId).uuid().null())
                    .col(ColumnDef::new(Quotes::Notes).text().null())
                    .col(
                        ColumnDef::new(Quotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Quotes::UpdatedAt)
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
                    .name("idx_quotes_tenant_dates")
                    .table(Quotes::Table)
                    .col(Quotes::TenantId)
                    .col(Quotes::StartDate)
                    .col(Quotes::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuoteItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuoteItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QuoteItems::TenantId).uuid().not_null())
                    .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                    .col(ColumnDef::new(QuoteItems::ItemId).uuid().not_null())
                    .col(ColumnDef::new(QuoteItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(QuoteItems::UnitPriceSnapshot)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_items_quote_id")
                            .from(QuoteItems::Table, QuoteItems::QuoteId)
                            .to(Quotes::Table, Quotes::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_items_item_id")
                            .from(QuoteItems::Table, QuoteItems::ItemId)
                            .to(InventoryItems::Table, InventoryItems::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quote_items_item_id")
                    .table(QuoteItems::Table)
                    .col(QuoteItems::ItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quote_items_quote_id")
                    .table(QuoteItems::Table)
                    .col(QuoteItems::QuoteId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuoteItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quotes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Quotes {
    Table,
    Id,
    TenantId,
    Name,
    CustomerName,
    StartDate,
    EndDate,
    Status,
    EventId,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QuoteItems {
    Table,
    Id,
    TenantId,
    QuoteId,
    ItemId,
    Quantity,
    UnitPriceSnapshot,
    CreatedAt,
    UpdatedAt,
}
