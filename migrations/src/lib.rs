pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_inventory_tables;
mod m20240601_000002_create_quote_tables;
mod m20240601_000003_create_event_tables;
mod m20240601_000004_create_ledger_audit_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_inventory_tables::Migration),
            Box::new(m20240601_000002_create_quote_tables::Migration),
            Box::new(m20240601_000003_create_event_tables::Migration),
            Box::new(m20240601_000004_create_ledger_audit_table::Migration),
        ]
    }
}
