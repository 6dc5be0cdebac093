//! Inventory ledger mutations.
//!
//! Consume and release move real quantity: serialized items flip unit
//! status between `available` and `out`, bulk items adjust
//! `inventory_stock.total_quantity`. Callers hold the item's lock from
//! [`ItemLocks`] and run inside a database transaction; unit and stock
//! reads take row locks on PostgreSQL.

use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    QueryFilter, QuerySelect, Select, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::entities::inventory_unit::UnitStatus;
use crate::entities::ledger_audit::{self, LedgerAction, LedgerOutcome};
use crate::entities::{inventory_item, inventory_stock, inventory_unit};
use crate::errors::ServiceError;

/// Per-item async locks serialising read-check-mutate sequences inside
/// this process. Entries live only while someone holds or waits on them.
#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Holds every lock taken by one [`ItemLocks::acquire`] call.
#[derive(Debug)]
pub struct ItemLockGuard {
    registry: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    ids: Vec<Uuid>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for ItemLockGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for id in &self.ids {
            // The map's own reference is the last one once nobody waits.
            self.registry
                .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the given ids in ascending order so overlapping multi-item
    /// operations cannot deadlock each other.
    pub async fn acquire(&self, ids: impl IntoIterator<Item = Uuid>) -> ItemLockGuard {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut guard = ItemLockGuard {
            registry: self.locks.clone(),
            ids: Vec::with_capacity(ids.len()),
            guards: Vec::with_capacity(ids.len()),
        };
        for id in ids {
            let lock = self.locks.entry(id).or_default().value().clone();
            guard.ids.push(id);
            guard.guards.push(lock.lock_owned().await);
        }
        guard
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Outcome of one consume or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerMutation {
    pub item_id: Uuid,
    pub action: LedgerAction,
    pub requested: i64,
    pub applied: i64,
}

impl LedgerMutation {
    pub fn is_shortfall(&self) -> bool {
        self.applied < self.requested
    }

    pub fn missing(&self) -> i64 {
        self.requested - self.applied
    }
}

fn locked<E, C>(query: Select<E>, conn: &C) -> Select<E>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if conn.get_database_backend() == DbBackend::Postgres {
        query.lock_exclusive()
    } else {
        query
    }
}

fn to_i32(value: i64, what: &str) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::ValidationError(format!("{} {} is out of range", what, value)))
}

#[derive(Debug, Clone)]
pub struct InventoryLedger {
    location: String,
    retry_attempts: u32,
}

impl InventoryLedger {
    pub fn new(location: impl Into<String>, retry_attempts: u32) -> Self {
        Self {
            location: location.into(),
            retry_attempts: retry_attempts.max(1),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// The bulk stock row at the ledger's location, if any.
    pub async fn stock_record<C>(
        &self,
        conn: &C,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<inventory_stock::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let query = inventory_stock::Entity::find()
            .filter(inventory_stock::Column::TenantId.eq(tenant_id))
            .filter(inventory_stock::Column::ItemId.eq(item_id))
            .filter(inventory_stock::Column::Location.eq(self.location.as_str()));

        locked(query, conn)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Removes `quantity` from availability. Serialized items flip that many
    /// available units to out; bulk items decrement the stock total.
    #[instrument(skip(self, conn, tenant, item), fields(tenant_id = %tenant.tenant_id, item_id = %item.id))]
    pub async fn consume<C>(
        &self,
        conn: &C,
        tenant: &TenantContext,
        item: &inventory_item::Model,
        quantity: i64,
        quote_id: Option<Uuid>,
    ) -> Result<LedgerMutation, ServiceError>
    where
        C: ConnectionTrait,
    {
        let applied = if quantity <= 0 {
            0
        } else if item.is_serialized {
            self.flip_units(conn, tenant.tenant_id, item.id, quantity, UnitStatus::Available, UnitStatus::Out)
                .await?
        } else {
            self.adjust_stock(conn, tenant.tenant_id, item.id, -quantity).await?
        };

        let mutation = LedgerMutation {
            item_id: item.id,
            action: LedgerAction::Consume,
            requested: quantity.max(0),
            applied,
        };
        self.finish(conn, tenant, quote_id, mutation).await?;
        Ok(mutation)
    }

    /// Returns `quantity` to availability. Serialized items flip out units
    /// back to available; bulk items increment the stock total, creating
    /// the stock row if the item has none.
    #[instrument(skip(self, conn, tenant, item), fields(tenant_id = %tenant.tenant_id, item_id = %item.id))]
    pub async fn release<C>(
        &self,
        conn: &C,
        tenant: &TenantContext,
        item: &inventory_item::Model,
        quantity: i64,
        quote_id: Option<Uuid>,
    ) -> Result<LedgerMutation, ServiceError>
    where
        C: ConnectionTrait,
    {
        let applied = if quantity <= 0 {
            0
        } else if item.is_serialized {
            self.flip_units(conn, tenant.tenant_id, item.id, quantity, UnitStatus::Out, UnitStatus::Available)
                .await?
        } else {
            self.adjust_stock(conn, tenant.tenant_id, item.id, quantity).await?
        };

        let mutation = LedgerMutation {
            item_id: item.id,
            action: LedgerAction::Release,
            requested: quantity.max(0),
            applied,
        };
        self.finish(conn, tenant, quote_id, mutation).await?;
        Ok(mutation)
    }

    /// Flips up to `count` units from one status to another. Which units
    /// are picked is unspecified.
    async fn flip_units<C>(
        &self,
        conn: &C,
        tenant_id: Uuid,
        item_id: Uuid,
        count: i64,
        from: UnitStatus,
        to: UnitStatus,
    ) -> Result<i64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let limit = u64::try_from(count).unwrap_or(0);
        let query = inventory_unit::Entity::find()
            .select_only()
            .column(inventory_unit::Column::Id)
            .filter(inventory_unit::Column::TenantId.eq(tenant_id))
            .filter(inventory_unit::Column::ItemId.eq(item_id))
            .filter(inventory_unit::Column::Status.eq(from))
            .limit(limit);

        let unit_ids: Vec<Uuid> = locked(query, conn)
            .into_tuple()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if unit_ids.is_empty() {
            return Ok(0);
        }

        // Re-check the status so a unit moved elsewhere is not counted.
        let result = inventory_unit::Entity::update_many()
            .col_expr(inventory_unit::Column::Status, Expr::value(to))
            .col_expr(inventory_unit::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_unit::Column::Id.is_in(unit_ids))
            .filter(inventory_unit::Column::Status.eq(from))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(result.rows_affected as i64)
    }

    /// Applies `delta` to the stock total with a version check, retrying on
    /// a concurrent write. Decrements stop at the out-of-service count.
    async fn adjust_stock<C>(
        &self,
        conn: &C,
        tenant_id: Uuid,
        item_id: Uuid,
        delta: i64,
    ) -> Result<i64, ServiceError>
    where
        C: ConnectionTrait,
    {
        for attempt in 1..=self.retry_attempts {
            let Some(stock) = self.stock_record(conn, tenant_id, item_id).await? else {
                if delta < 0 {
                    return Err(ServiceError::ValidationError(format!(
                        "Inventory item {} has no stock record at location '{}'",
                        item_id, self.location
                    )));
                }
                inventory_stock::ActiveModel {
                    tenant_id: Set(tenant_id),
                    item_id: Set(item_id),
                    location: Set(self.location.clone()),
                    total_quantity: Set(to_i32(delta, "stock quantity")?),
                    out_of_service_quantity: Set(0),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(ServiceError::db_error)?;
                return Ok(delta);
            };

            let current = i64::from(stock.total_quantity);
            let floor = i64::from(stock.out_of_service_quantity);
            let target = if delta < 0 {
                (current + delta).max(floor.min(current))
            } else {
                current + delta
            };

            let result = inventory_stock::Entity::update_many()
                .col_expr(
                    inventory_stock::Column::TotalQuantity,
                    Expr::value(to_i32(target, "stock quantity")?),
                )
                .col_expr(inventory_stock::Column::Version, Expr::value(stock.version + 1))
                .col_expr(inventory_stock::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(inventory_stock::Column::Id.eq(stock.id))
                .filter(inventory_stock::Column::Version.eq(stock.version))
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;

            if result.rows_affected == 1 {
                return Ok((target - current).abs());
            }

            debug!(%item_id, attempt, version = stock.version, "stock version changed; retrying");
        }

        counter!("gearhouse_ledger.version_conflicts", 1);
        Err(ServiceError::LedgerMutation(format!(
            "stock for item {} kept changing after {} attempts",
            item_id, self.retry_attempts
        )))
    }

    async fn finish<C>(
        &self,
        conn: &C,
        tenant: &TenantContext,
        quote_id: Option<Uuid>,
        mutation: LedgerMutation,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        match mutation.action {
            LedgerAction::Consume => counter!("gearhouse_ledger.consumed", mutation.applied.max(0) as u64),
            LedgerAction::Release => counter!("gearhouse_ledger.released", mutation.applied.max(0) as u64),
        }

        let outcome = if mutation.is_shortfall() {
            counter!("gearhouse_ledger.shortfall", 1);
            warn!(
                item_id = %mutation.item_id,
                action = %mutation.action,
                requested = mutation.requested,
                applied = mutation.applied,
                "ledger mutation applied partially"
            );
            LedgerOutcome::Partial
        } else {
            LedgerOutcome::Applied
        };

        if mutation.requested == 0 {
            return Ok(());
        }

        ledger_audit::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant.tenant_id),
            item_id: Set(mutation.item_id),
            quote_id: Set(quote_id),
            action: Set(mutation.action),
            requested: Set(to_i32(mutation.requested, "requested quantity")?),
            applied: Set(to_i32(mutation.applied, "applied quantity")?),
            outcome: Set(outcome),
            detail: Set(Some(format!("actor={}", tenant.actor))),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        Ok(())
    }
}
