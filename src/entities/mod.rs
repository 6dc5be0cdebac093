pub mod event;
pub mod event_inventory;
pub mod inventory_item;
pub mod inventory_stock;
pub mod inventory_unit;
pub mod ledger_audit;
pub mod quote;
pub mod quote_item;
