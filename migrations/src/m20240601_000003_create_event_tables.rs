use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // quote_id is a loose link: deleting a quote keeps its event.
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Events::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Events::Name).string().not_null())
                    .col(ColumnDef::new(Events::Description).text().null())
                    .col(ColumnDef::new(Events::StartDate).date().not_null())
                    .col(ColumnDef::new(Events::EndDate).date().not_null())
                    .col(ColumnDef::new(Events::QuoteId).uuid().null())
                    .col(
                        ColumnDef::new(Events::Status)
                            .string()
                            .not_null()
                            .default("confirmed"),
                    )
                    .col(
                        ColumnDef::new(Events::CreatedAt)
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
                    .name("idx_events_quote_id")
                    .table(Events::Table)
                    .col(Events::QuoteId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventInventory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventInventory::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventInventory::TenantId).uuid().not_null())
                    .col(ColumnDef::new(EventInventory::EventId).uuid().not_null())
                    .col(ColumnDef::new(EventInventory::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(EventInventory::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventInventory::UnitPriceSnapshot)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventInventory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_inventory_event_id")
                            .from(EventInventory::Table, EventInventory::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_inventory_event_id")
                    .table(EventInventory::Table)
                    .col(EventInventory::EventId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventInventory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    TenantId,
    Name,
    Description,
    StartDate,
    EndDate,
    QuoteId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EventInventory {
    Table,
    Id,
    TenantId,
    EventId,
    ItemId,
    Quantity,
    UnitPriceSnapshot,
    CreatedAt,
}
