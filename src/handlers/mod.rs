pub mod common;
pub mod events;
pub mod inventory;
pub mod quotes;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    inventory::InventoryService,
    ledger::{InventoryLedger, ItemLocks},
    quotes::QuoteService,
    rental_events::RentalEventService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub quotes: Arc<QuoteService>,
    pub rental_events: Arc<RentalEventService>,
}

impl AppServices {
    /// Wires every service around one ledger and one lock registry, so all
    /// handlers serialise on the same per-item locks.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let ledger = Arc::new(InventoryLedger::new(
            config.default_stock_location.clone(),
            config.ledger_retry_attempts,
        ));
        let locks = Arc::new(ItemLocks::new());

        let rental_events = Arc::new(RentalEventService::new(
            db_pool.clone(),
            locks.clone(),
            event_sender.clone(),
        ));
        let quotes = Arc::new(QuoteService::new(
            db_pool.clone(),
            ledger.clone(),
            locks.clone(),
            event_sender,
            rental_events.clone(),
        ));
        let inventory = Arc::new(InventoryService::new(db_pool, ledger, locks));

        Self {
            inventory,
            quotes,
            rental_events,
        }
    }
}
