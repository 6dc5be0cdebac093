use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only record of every consume/release the quote engine applies
        manager
            .create_table(
                Table::create()
                    .table(LedgerAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerAudit::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerAudit::TenantId).uuid().not_null())
                    .col(ColumnDef::new(LedgerAudit::ItemId).uuid().not_null())
                    .col(ColumnDef::new(LedgerAudit::QuoteId).uuid().null())
                    .col(ColumnDef::new(LedgerAudit::Action).string().not_null())
                    .col(ColumnDef::new(LedgerAudit::Requested).integer().not_null())
                    .col(ColumnDef::new(LedgerAudit::Applied).integer().not_null())
                    .col(ColumnDef::new(LedgerAudit::Outcome).string().not_null())
                    .col(ColumnDef::new(LedgerAudit::Detail).text().null())
                    .col(
                        ColumnDef::new(LedgerAudit::CreatedAt)
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
                    .name("idx_ledger_audit_item_id")
                    .table(LedgerAudit::Table)
                    .col(LedgerAudit::ItemId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerAudit::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LedgerAudit {
    Table,
    Id,
    TenantId,
    ItemId,
    QuoteId,
    Action,
    Requested,
    Applied,
    Outcome,
    Detail,
    CreatedAt,
}
