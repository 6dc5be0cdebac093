use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InventoryItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryItems::TenantId).uuid().not_null())
                    .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                    .col(ColumnDef::new(InventoryItems::Description).text().null())
                    .col(
                        ColumnDef::new(InventoryItems::IsSerialized)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::Price)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Archived rows are renamed with a timestamp suffix, so a plain unique
        // index is enough to keep active names unique per tenant.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_items_tenant_name")
                    .table(InventoryItems::Table)
                    .col(InventoryItems::TenantId)
                    .col(InventoryItems::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryUnits::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryUnits::TenantId).uuid().not_null())
                    .col(ColumnDef::new(InventoryUnits::ItemId).uuid().not_null())
                    .col(ColumnDef::new(InventoryUnits::SerialNumber).string().null())
                    .col(
                        ColumnDef::new(InventoryUnits::Status)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(InventoryUnits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryUnits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_units_item_id")
                            .from(InventoryUnits::Table, InventoryUnits::ItemId)
                            .to(InventoryItems::Table, InventoryItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_units_item_status")
                    .table(InventoryUnits::Table)
                    .col(InventoryUnits::ItemId)
                    .col(InventoryUnits::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryStock::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryStock::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryStock::TenantId).uuid().not_null())
                    .col(ColumnDef::new(InventoryStock::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(InventoryStock::Location)
                            .string()
                            .not_null()
                            .default("main"),
                    )
                    .col(
                        ColumnDef::new(InventoryStock::TotalQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryStock::OutOfServiceQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryStock::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(InventoryStock::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_stock_item_id")
                            .from(InventoryStock::Table, InventoryStock::ItemId)
                            .to(InventoryItems::Table, InventoryItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_stock_item_location")
                    .table(InventoryStock::Table)
                    .col(InventoryStock::ItemId)
                    .col(InventoryStock::Location)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryStock::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InventoryUnits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum InventoryItems {
    Table,
    Id,
    TenantId,
    Name,
    Description,
    IsSerialized,
    Price,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InventoryUnits {
    Table,
    Id,
    TenantId,
    ItemId,
    SerialNumber,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InventoryStock {
    Table,
    Id,
    TenantId,
    ItemId,
    Location,
    TotalQuantity,
    OutOfServiceQuantity,
    Version,
    UpdatedAt,
}
