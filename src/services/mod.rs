// Read side
pub mod availability;
pub mod reservations;

// Ledger mutations and the quote state machine
pub mod ledger;
pub mod quotes;

// Catalogue and events
pub mod inventory;
pub mod rental_events;

use chrono::NaiveDate;
use metrics::counter;
use sea_orm::DatabaseTransaction;
use tracing::error;

use crate::errors::ServiceError;
use reservations::DateRange;

/// Commits `txn`, counting the outcome per operation.
pub(crate) async fn commit(txn: DatabaseTransaction, operation: &'static str) -> Result<(), ServiceError> {
    match txn.commit().await {
        Ok(()) => {
            counter!("gearhouse_db.transaction.committed", 1, "operation" => operation);
            Ok(())
        }
        Err(e) => {
            counter!("gearhouse_db.transaction.failed", 1, "operation" => operation);
            error!(operation, error = %e, "transaction commit failed");
            Err(ServiceError::db_error(e))
        }
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(format!(
            "{} '{}' is not a valid date (expected YYYY-MM-DD)",
            field, value
        ))
    })
}

pub fn parse_range(start: &str, end: &str) -> Result<DateRange, ServiceError> {
    DateRange::new(parse_date("start_date", start)?, parse_date("end_date", end)?)
}
