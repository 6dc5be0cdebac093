//! Availability calculator.
//!
//! Combines ledger counts (units or bulk stock) with the reservation index
//! into an [`AvailabilityBreakdown`]. `available` is the literal checkout
//! state of the ledger; `effective_available` additionally subtracts what
//! other quotes have claimed for an overlapping window and is the figure
//! that gates new or larger quote lines.

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::inventory_unit::UnitStatus;
use crate::entities::{inventory_item, inventory_stock, inventory_unit};
use crate::errors::ServiceError;
use crate::services::reservations::{self, DateContext};

/// Raw ledger figures for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub total: i64,
    pub out_of_service: i64,
    pub in_transit: i64,
    pub available: i64,
}

impl LedgerCounts {
    /// Serialized items: one unit per row, bucketed by status.
    pub fn from_units(available: i64, out: i64, maintenance: i64) -> Self {
        Self {
            total: available + out + maintenance,
            out_of_service: maintenance,
            in_transit: out,
            available,
        }
    }

    /// Bulk items never report in-transit stock.
    pub fn from_stock(total: i64, out_of_service: i64) -> Self {
        Self {
            total,
            out_of_service,
            in_transit: 0,
            available: total - out_of_service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityBreakdown {
    pub item_id: Uuid,
    pub is_serialized: bool,
    pub total: i64,
    pub out_of_service: i64,
    pub in_transit: i64,
    pub available: i64,
    /// Every quote line for the item, regardless of dates
    pub reserved: i64,
    /// Present only when a date window was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_in_overlapping_events: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_available: Option<i64>,
}

impl AvailabilityBreakdown {
    /// The number a new or grown reservation is checked against.
    pub fn gate(&self) -> i64 {
        self.effective_available.unwrap_or(self.available)
    }
}

pub fn compute_breakdown(
    item_id: Uuid,
    is_serialized: bool,
    counts: LedgerCounts,
    reserved: i64,
    reserved_in_overlapping: Option<i64>,
) -> AvailabilityBreakdown {
    AvailabilityBreakdown {
        item_id,
        is_serialized,
        total: counts.total,
        out_of_service: counts.out_of_service,
        in_transit: counts.in_transit,
        available: counts.available,
        reserved,
        reserved_in_overlapping_events: reserved_in_overlapping,
        effective_available: reserved_in_overlapping
            .map(|overlap| effective_available(counts.total, counts.out_of_service, overlap)),
    }
}

pub fn effective_available(total: i64, out_of_service: i64, reserved_in_overlapping: i64) -> i64 {
    (total - out_of_service - reserved_in_overlapping).max(0)
}

/// Advisory safety margin for a requested quantity. Never enforced.
pub fn calculate_buffer_quantity(is_serialized: bool, total: i64, requested: i64) -> i64 {
    if is_serialized {
        return if total < 5 { 1 } else { 0 };
    }
    if requested <= 0 {
        return 0;
    }
    // ceil(q * 0.2) below ten units, ceil(q * 0.1) from ten up
    if requested < 10 {
        (requested * 2 + 9) / 10
    } else {
        (requested + 9) / 10
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Green,
    Yellow,
    Red,
}

/// Classifies one line: short is red, inside the buffer is yellow.
pub fn classify_line(available: i64, quantity: i64, buffer: i64) -> RiskLevel {
    if available < quantity {
        RiskLevel::Red
    } else if available < quantity + buffer {
        RiskLevel::Yellow
    } else {
        RiskLevel::Green
    }
}

#[derive(Debug, Clone)]
pub struct RiskInput {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i64,
    pub buffer: i64,
    pub breakdown: Option<AvailabilityBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineRisk {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i64,
    pub buffer: i64,
    pub available: Option<i64>,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuoteRisk {
    pub level: RiskLevel,
    pub lines: Vec<LineRisk>,
}

/// The worst line decides the quote; a line without a breakdown is red.
pub fn calculate_quote_risk(inputs: &[RiskInput]) -> QuoteRisk {
    let lines: Vec<LineRisk> = inputs
        .iter()
        .map(|input| {
            let available = input.breakdown.as_ref().map(AvailabilityBreakdown::gate);
            let level = match available {
                Some(avail) => classify_line(avail, input.quantity, input.buffer),
                None => RiskLevel::Red,
            };
            LineRisk {
                item_id: input.item_id,
                item_name: input.item_name.clone(),
                quantity: input.quantity,
                buffer: input.buffer,
                available,
                level,
            }
        })
        .collect();

    let level = lines
        .iter()
        .map(|l| l.level)
        .max()
        .unwrap_or(RiskLevel::Green);

    QuoteRisk { level, lines }
}

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: UnitStatus,
    count: i64,
}

/// Reads the ledger counts for an item.
pub async fn ledger_counts<C>(
    conn: &C,
    tenant_id: Uuid,
    item: &inventory_item::Model,
) -> Result<LedgerCounts, ServiceError>
where
    C: ConnectionTrait,
{
    if item.is_serialized {
        let buckets = inventory_unit::Entity::find()
            .select_only()
            .column(inventory_unit::Column::Status)
            .column_as(inventory_unit::Column::Id.count(), "count")
            .filter(inventory_unit::Column::TenantId.eq(tenant_id))
            .filter(inventory_unit::Column::ItemId.eq(item.id))
            .group_by(inventory_unit::Column::Status)
            .into_model::<StatusCount>()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let count_of = |status: UnitStatus| {
            buckets
                .iter()
                .filter(|b| b.status == status)
                .map(|b| b.count)
                .sum::<i64>()
        };

        Ok(LedgerCounts::from_units(
            count_of(UnitStatus::Available),
            count_of(UnitStatus::Out),
            count_of(UnitStatus::Maintenance),
        ))
    } else {
        let rows = inventory_stock::Entity::find()
            .filter(inventory_stock::Column::TenantId.eq(tenant_id))
            .filter(inventory_stock::Column::ItemId.eq(item.id))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let total = rows.iter().map(|r| i64::from(r.total_quantity)).sum();
        let out_of_service = rows
            .iter()
            .map(|r| i64::from(r.out_of_service_quantity))
            .sum();

        Ok(LedgerCounts::from_stock(total, out_of_service))
    }
}

/// Loads an item scoped to the tenant.
pub async fn find_item<C>(
    conn: &C,
    tenant_id: Uuid,
    item_id: Uuid,
) -> Result<inventory_item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    inventory_item::Entity::find_by_id(item_id)
        .filter(inventory_item::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", item_id)))
}

/// Full breakdown for one item. Ledger counts and reservation rows are
/// fetched concurrently.
pub async fn item_availability_breakdown<C>(
    conn: &C,
    tenant_id: Uuid,
    item: &inventory_item::Model,
    ctx: Option<&DateContext>,
) -> Result<AvailabilityBreakdown, ServiceError>
where
    C: ConnectionTrait,
{
    let (counts, rows) = futures::try_join!(
        ledger_counts(conn, tenant_id, item),
        reservations::reservation_rows(conn, tenant_id, item.id),
    )?;

    Ok(compute_breakdown(
        item.id,
        item.is_serialized,
        counts,
        reservations::total_reserved(&rows),
        ctx.map(|c| reservations::reserved_in_overlapping(&rows, c)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_breakdown_without_dates() {
        let id = Uuid::new_v4();
        let b = compute_breakdown(id, false, LedgerCounts::from_stock(10, 2), 0, None);
        assert_eq!(b.available, 8);
        assert_eq!(b.total, 10);
        assert_eq!(b.out_of_service, 2);
        assert_eq!(b.in_transit, 0);
        assert_eq!(b.reserved, 0);
        assert_eq!(b.effective_available, None);
        assert_eq!(b.gate(), 8);
    }

    #[test]
    fn effective_available_subtracts_overlap_and_floors_at_zero() {
        let b = compute_breakdown(Uuid::new_v4(), false, LedgerCounts::from_stock(10, 2), 5, Some(5));
        assert_eq!(b.effective_available, Some(3));
        assert_eq!(effective_available(10, 2, 20), 0);
    }

    #[test]
    fn serialized_counts_bucket_by_status() {
        let counts = LedgerCounts::from_units(3, 2, 1);
        assert_eq!(counts.total, 6);
        assert_eq!(counts.in_transit, 2);
        assert_eq!(counts.out_of_service, 1);
        assert_eq!(counts.available, 3);
    }

    #[test]
    fn empty_stock_reports_zero() {
        let b = compute_breakdown(Uuid::new_v4(), false, LedgerCounts::from_stock(0, 0), 0, Some(0));
        assert_eq!(b.available, 0);
        assert_eq!(b.effective_available, Some(0));
    }

    #[test]
    fn buffer_quantities() {
        assert_eq!(calculate_buffer_quantity(true, 4, 2), 1);
        assert_eq!(calculate_buffer_quantity(true, 5, 2), 0);
        assert_eq!(calculate_buffer_quantity(false, 100, 1), 1);
        assert_eq!(calculate_buffer_quantity(false, 100, 5), 1);
        assert_eq!(calculate_buffer_quantity(false, 100, 6), 2);
        assert_eq!(calculate_buffer_quantity(false, 100, 9), 2);
        assert_eq!(calculate_buffer_quantity(false, 100, 10), 1);
        assert_eq!(calculate_buffer_quantity(false, 100, 11), 2);
        assert_eq!(calculate_buffer_quantity(false, 100, 0), 0);
    }

    #[test]
    fn line_classification() {
        assert_eq!(classify_line(4, 5, 1), RiskLevel::Red);
        assert_eq!(classify_line(5, 5, 1), RiskLevel::Yellow);
        assert_eq!(classify_line(6, 5, 1), RiskLevel::Green);
    }

    fn input(quantity: i64, buffer: i64, gate: Option<i64>) -> RiskInput {
        let item_id = Uuid::new_v4();
        RiskInput {
            item_id,
            item_name: "Speaker".into(),
            quantity,
            buffer,
            breakdown: gate.map(|g| {
                compute_breakdown(item_id, false, LedgerCounts::from_stock(g, 0), 0, Some(0))
            }),
        }
    }

    #[test]
    fn worst_line_decides_quote_risk() {
        let risk = calculate_quote_risk(&[input(2, 1, Some(10)), input(5, 1, Some(5))]);
        assert_eq!(risk.level, RiskLevel::Yellow);

        let risk = calculate_quote_risk(&[input(5, 1, Some(5)), input(3, 1, Some(2))]);
        assert_eq!(risk.level, RiskLevel::Red);
    }

    #[test]
    fn missing_breakdown_forces_red() {
        let risk = calculate_quote_risk(&[input(1, 0, Some(100)), input(1, 0, None)]);
        assert_eq!(risk.level, RiskLevel::Red);
        assert_eq!(risk.lines[1].available, None);
    }

    #[test]
    fn empty_quote_is_green() {
        assert_eq!(calculate_quote_risk(&[]).level, RiskLevel::Green);
    }
}
