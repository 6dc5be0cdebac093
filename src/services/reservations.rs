//! Read-side index over quote lines: how much of an item other quotes have
//! promised, globally and within a date window.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{quote, quote_item};
use crate::errors::ServiceError;

/// Inclusive calendar-day interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ServiceError> {
        if end < start {
            return Err(ServiceError::ValidationError(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Both ends inclusive: a range ending the day another starts overlaps it.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// The window a candidate reservation is checked against, and the quote
/// whose own lines must not count against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    pub range: DateRange,
    pub exclude_quote_id: Option<Uuid>,
}

impl DateContext {
    pub fn for_quote(quote: &quote::Model) -> Self {
        Self {
            range: DateRange {
                start: quote.start_date,
                end: quote.end_date,
            },
            exclude_quote_id: Some(quote.id),
        }
    }
}

/// One quote line joined to its parent quote's window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRow {
    pub quote_id: Uuid,
    pub quantity: i64,
    pub range: DateRange,
    pub status: quote::QuoteStatus,
}

/// Loads every line referencing `item_id` together with its quote.
/// Lines whose quote cannot be joined are skipped.
pub async fn reservation_rows<C>(
    conn: &C,
    tenant_id: Uuid,
    item_id: Uuid,
) -> Result<Vec<ReservationRow>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = quote_item::Entity::find()
        .filter(quote_item::Column::TenantId.eq(tenant_id))
        .filter(quote_item::Column::ItemId.eq(item_id))
        .find_also_related(quote::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let total_rows = rows.len();
    let joined: Vec<ReservationRow> = rows
        .into_iter()
        .filter_map(|(line, parent)| {
            parent
                .filter(|q| q.tenant_id == tenant_id)
                .map(|q| ReservationRow {
                    quote_id: line.quote_id,
                    quantity: i64::from(line.quantity),
                    range: DateRange {
                        start: q.start_date,
                        end: q.end_date,
                    },
                    status: q.status,
                })
        })
        .collect();

    if joined.len() != total_rows {
        debug!(
            %item_id,
            skipped = total_rows - joined.len(),
            "skipped quote lines without a joinable quote"
        );
    }

    Ok(joined)
}

/// Sum of every line for the item regardless of dates.
pub fn total_reserved(rows: &[ReservationRow]) -> i64 {
    rows.iter().map(|r| r.quantity).sum()
}

/// Sum of lines from other quotes whose window overlaps the context.
pub fn reserved_in_overlapping(rows: &[ReservationRow], ctx: &DateContext) -> i64 {
    rows.iter()
        .filter(|r| Some(r.quote_id) != ctx.exclude_quote_id)
        .filter(|r| r.range.overlaps(&ctx.range))
        .map(|r| r.quantity)
        .sum()
}

/// Quantity of `item_id` already on `quote_id`, optionally ignoring one line.
pub async fn quantity_held_in_quote<C>(
    conn: &C,
    tenant_id: Uuid,
    quote_id: Uuid,
    item_id: Uuid,
    except_line: Option<Uuid>,
) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let mut query = quote_item::Entity::find()
        .filter(quote_item::Column::TenantId.eq(tenant_id))
        .filter(quote_item::Column::QuoteId.eq(quote_id))
        .filter(quote_item::Column::ItemId.eq(item_id));
    if let Some(line_id) = except_line {
        query = query.filter(quote_item::Column::Id.ne(line_id));
    }

    let lines = query.all(conn).await.map_err(ServiceError::db_error)?;
    Ok(lines.iter().map(|l| i64::from(l.quantity)).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(d(a), d(b)).unwrap()
    }

    fn row(quote_id: Uuid, quantity: i64, r: DateRange) -> ReservationRow {
        ReservationRow {
            quote_id,
            quantity,
            range: r,
            status: quote::QuoteStatus::Draft,
        }
    }

    #[test]
    fn touching_ranges_overlap() {
        let a = range("2024-06-01", "2024-06-05");
        let b = range("2024-06-05", "2024-06-09");
        let c = range("2024-06-06", "2024-06-09");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn single_day_range_is_valid() {
        let day = range("2024-06-03", "2024-06-03");
        assert!(day.overlaps(&range("2024-06-01", "2024-06-05")));
    }

    #[test]
    fn reversed_range_rejected() {
        assert!(DateRange::new(d("2024-06-05"), d("2024-06-01")).is_err());
    }

    #[test]
    fn overlapping_sum_excludes_own_quote_and_disjoint_windows() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rows = vec![
            row(me, 4, range("2024-06-01", "2024-06-05")),
            row(other, 5, range("2024-06-01", "2024-06-05")),
            row(other, 7, range("2024-07-01", "2024-07-05")),
        ];
        let ctx = DateContext {
            range: range("2024-06-03", "2024-06-07"),
            exclude_quote_id: Some(me),
        };

        assert_eq!(total_reserved(&rows), 16);
        assert_eq!(reserved_in_overlapping(&rows, &ctx), 5);
    }
}
