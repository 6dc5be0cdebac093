use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::TenantContext;
use crate::entities::inventory_unit::UnitStatus;
use crate::entities::{inventory_item, inventory_stock, inventory_unit};
use crate::errors::ServiceError;
use crate::services::availability::{self, calculate_buffer_quantity, AvailabilityBreakdown};
use crate::services::ledger::{InventoryLedger, ItemLocks};
use crate::services::reservations::DateContext;
use crate::services::{commit, parse_range};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_serialized: bool,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Stock total for bulk items, or number of units to create for
    /// serialized items
    #[validate(range(min = 0, max = 100000))]
    pub initial_quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200, message = "Item name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub is_serialized: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddUnitsRequest {
    #[validate(range(min = 1, max = 1000))]
    pub count: u32,
    /// Units are numbered `<prefix>-0001`, `<prefix>-0002`, ...
    pub serial_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetUnitStatusRequest {
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetStockRequest {
    #[validate(range(min = 0))]
    pub total_quantity: i32,
    #[validate(range(min = 0))]
    pub out_of_service_quantity: i32,
}

/// Optional date window for an availability lookup; both ends or neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityWindow {
    pub start: Option<String>,
    pub end: Option<String>,
    pub exclude_quote_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BufferSuggestion {
    pub item_id: Uuid,
    pub quantity: i64,
    pub buffer: i64,
    pub suggested_total: i64,
}

/// Suffix appended to an archived item's name, freeing the original name.
pub fn archived_name(name: &str, at: chrono::DateTime<Utc>) -> String {
    format!("{} (archived {})", name, at.format("%Y%m%dT%H%M%S"))
}

fn non_empty_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Item name cannot be blank".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn non_negative_price(price: Decimal) -> Result<Decimal, ServiceError> {
    if price.is_sign_negative() {
        return Err(ServiceError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    Ok(price)
}

/// Service for the inventory catalogue: items, serialized units and bulk stock
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    ledger: Arc<InventoryLedger>,
    locks: Arc<ItemLocks>,
}

impl InventoryService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: Arc<InventoryLedger>,
        locks: Arc<ItemLocks>,
    ) -> Self {
        Self { db, ledger, locks }
    }

    /// Creates an item together with its stock row (bulk) or its initial
    /// units (serialized).
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id))]
    pub async fn create_item(
        &self,
        tenant: &TenantContext,
        request: CreateItemRequest,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;
        let name = non_empty_name(&request.name)?;
        let price = non_negative_price(request.price)?;
        let initial = request.initial_quantity.unwrap_or(0);

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = inventory_item::ActiveModel {
            tenant_id: Set(tenant.tenant_id),
            name: Set(name),
            description: Set(request.description),
            is_serialized: Set(request.is_serialized),
            price: Set(price),
            active: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        if item.is_serialized {
            for _ in 0..initial {
                inventory_unit::ActiveModel {
                    tenant_id: Set(tenant.tenant_id),
                    item_id: Set(item.id),
                    serial_number: Set(None),
                    status: Set(UnitStatus::Available),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            }
        } else {
            inventory_stock::ActiveModel {
                tenant_id: Set(tenant.tenant_id),
                item_id: Set(item.id),
                location: Set(self.ledger.location().to_string()),
                total_quantity: Set(initial),
                out_of_service_quantity: Set(0),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        commit(txn, "create_item").await?;
        info!(item_id = %item.id, name = %item.name, serialized = item.is_serialized, "inventory item created");
        Ok(item)
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn list_items(
        &self,
        tenant: &TenantContext,
        include_archived: bool,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let mut query = inventory_item::Entity::find()
            .filter(inventory_item::Column::TenantId.eq(tenant.tenant_id));
        if !include_archived {
            query = query.filter(inventory_item::Column::Active.eq(true));
        }
        query
            .order_by_asc(inventory_item::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn get_item(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
    ) -> Result<inventory_item::Model, ServiceError> {
        availability::find_item(&*self.db, tenant.tenant_id, item_id).await
    }

    /// The tracking mode can only change while the item has neither units
    /// nor stock.
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id))]
    pub async fn update_item(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
        request: UpdateItemRequest,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;
        let _guard = self.locks.acquire([item_id]).await;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = availability::find_item(&txn, tenant.tenant_id, item_id).await?;
        if !item.active {
            return Err(ServiceError::InvalidOperation(format!(
                "Inventory item {} is archived",
                item_id
            )));
        }

        let mut active: inventory_item::ActiveModel = item.clone().into();

        if let Some(name) = request.name.as_deref() {
            active.name = Set(non_empty_name(name)?);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(non_negative_price(price)?);
        }
        if let Some(serialized) = request.is_serialized {
            if serialized != item.is_serialized {
                let units = inventory_unit::Entity::find()
                    .filter(inventory_unit::Column::ItemId.eq(item.id))
                    .count(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                let stock = inventory_stock::Entity::find()
                    .filter(inventory_stock::Column::ItemId.eq(item.id))
                    .count(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if units > 0 || stock > 0 {
                    return Err(ServiceError::InvalidOperation(
                        "Tracking mode cannot change once units or stock exist".to_string(),
                    ));
                }
                active.is_serialized = Set(serialized);
            }
        }

        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;
        commit(txn, "update_item").await?;
        Ok(updated)
    }

    /// Soft delete. The row stays so quote and event history keeps resolving.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn archive_item(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
    ) -> Result<inventory_item::Model, ServiceError> {
        let _guard = self.locks.acquire([item_id]).await;
        let item = availability::find_item(&*self.db, tenant.tenant_id, item_id).await?;
        if !item.active {
            return Ok(item);
        }

        let renamed = archived_name(&item.name, Utc::now());
        let mut active: inventory_item::ActiveModel = item.into();
        active.name = Set(renamed);
        active.active = Set(false);
        let archived = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(%item_id, name = %archived.name, "inventory item archived");
        Ok(archived)
    }

    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id, count = request.count))]
    pub async fn add_units(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
        request: AddUnitsRequest,
    ) -> Result<Vec<inventory_unit::Model>, ServiceError> {
        request.validate()?;

        let _guard = self.locks.acquire([item_id]).await;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = availability::find_item(&txn, tenant.tenant_id, item_id).await?;
        if !item.is_serialized {
            return Err(ServiceError::InvalidOperation(format!(
                "'{}' is tracked in bulk; set its stock instead",
                item.name
            )));
        }
        if !item.active {
            return Err(ServiceError::InvalidOperation(format!(
                "Inventory item {} is archived",
                item_id
            )));
        }

        let existing = inventory_unit::Entity::find()
            .filter(inventory_unit::Column::ItemId.eq(item.id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let prefix = request
            .serial_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let mut units = Vec::with_capacity(request.count as usize);
        for n in 1..=u64::from(request.count) {
            let unit = inventory_unit::ActiveModel {
                tenant_id: Set(tenant.tenant_id),
                item_id: Set(item.id),
                serial_number: Set(prefix.map(|p| format!("{}-{:04}", p, existing + n))),
                status: Set(UnitStatus::Available),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
            units.push(unit);
        }

        commit(txn, "add_units").await?;
        info!(%item_id, added = units.len(), "units added");
        Ok(units)
    }

    /// Maintenance workflow. Units that are out on a quote belong to the
    /// reservation logic and cannot be moved here.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id, status = %status))]
    pub async fn set_unit_status(
        &self,
        tenant: &TenantContext,
        unit_id: Uuid,
        status: UnitStatus,
    ) -> Result<inventory_unit::Model, ServiceError> {
        if status == UnitStatus::Out {
            return Err(ServiceError::ValidationError(
                "Units are checked out by confirming a quote".to_string(),
            ));
        }

        let unit = inventory_unit::Entity::find_by_id(unit_id)
            .filter(inventory_unit::Column::TenantId.eq(tenant.tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Unit {} not found", unit_id)))?;

        let _guard = self.locks.acquire([unit.item_id]).await;

        // Conditional on the status we read so a concurrent checkout wins.
        let result = inventory_unit::Entity::update_many()
            .col_expr(inventory_unit::Column::Status, Expr::value(status))
            .col_expr(inventory_unit::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_unit::Column::Id.eq(unit.id))
            .filter(inventory_unit::Column::Status.ne(UnitStatus::Out))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Unit {} is out on a quote",
                unit_id
            )));
        }

        inventory_unit::Entity::find_by_id(unit.id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Unit {} not found", unit_id)))
    }

    /// Overwrites the bulk counters at the default location.
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id))]
    pub async fn set_stock(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
        request: SetStockRequest,
    ) -> Result<inventory_stock::Model, ServiceError> {
        request.validate()?;
        if request.out_of_service_quantity > request.total_quantity {
            return Err(ServiceError::ValidationError(
                "Out-of-service quantity cannot exceed the total".to_string(),
            ));
        }

        let _guard = self.locks.acquire([item_id]).await;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = availability::find_item(&txn, tenant.tenant_id, item_id).await?;
        if item.is_serialized {
            return Err(ServiceError::InvalidOperation(format!(
                "'{}' is serialized; add or service units instead",
                item.name
            )));
        }

        let stock = match self
            .ledger
            .stock_record(&txn, tenant.tenant_id, item.id)
            .await?
        {
            Some(existing) => {
                let result = inventory_stock::Entity::update_many()
                    .col_expr(
                        inventory_stock::Column::TotalQuantity,
                        Expr::value(request.total_quantity),
                    )
                    .col_expr(
                        inventory_stock::Column::OutOfServiceQuantity,
                        Expr::value(request.out_of_service_quantity),
                    )
                    .col_expr(inventory_stock::Column::Version, Expr::value(existing.version + 1))
                    .col_expr(inventory_stock::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(inventory_stock::Column::Id.eq(existing.id))
                    .filter(inventory_stock::Column::Version.eq(existing.version))
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Stock for item {} changed concurrently",
                        item.id
                    )));
                }
                inventory_stock::Model {
                    total_quantity: request.total_quantity,
                    out_of_service_quantity: request.out_of_service_quantity,
                    version: existing.version + 1,
                    ..existing
                }
            }
            None => inventory_stock::ActiveModel {
                tenant_id: Set(tenant.tenant_id),
                item_id: Set(item.id),
                location: Set(self.ledger.location().to_string()),
                total_quantity: Set(request.total_quantity),
                out_of_service_quantity: Set(request.out_of_service_quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?,
        };

        commit(txn, "set_stock").await?;
        info!(
            %item_id,
            total = stock.total_quantity,
            out_of_service = stock.out_of_service_quantity,
            "stock set"
        );
        Ok(stock)
    }

    /// Ledger breakdown for an item, date-aware when a window is given.
    #[instrument(skip(self, tenant, window), fields(tenant_id = %tenant.tenant_id))]
    pub async fn availability(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
        window: AvailabilityWindow,
    ) -> Result<AvailabilityBreakdown, ServiceError> {
        let ctx = match (window.start.as_deref(), window.end.as_deref()) {
            (Some(start), Some(end)) => Some(DateContext {
                range: parse_range(start, end)?,
                exclude_quote_id: window.exclude_quote_id,
            }),
            (None, None) => None,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Provide both start and end, or neither".to_string(),
                ))
            }
        };

        let db = &*self.db;
        let item = availability::find_item(db, tenant.tenant_id, item_id).await?;
        availability::item_availability_breakdown(db, tenant.tenant_id, &item, ctx.as_ref()).await
    }

    /// Advisory extra quantity to hold for a request. Never enforced.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn buffer_suggestion(
        &self,
        tenant: &TenantContext,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<BufferSuggestion, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let db = &*self.db;
        let item = availability::find_item(db, tenant.tenant_id, item_id).await?;
        let counts = availability::ledger_counts(db, tenant.tenant_id, &item).await?;
        let buffer = calculate_buffer_quantity(item.is_serialized, counts.total, quantity);

        Ok(BufferSuggestion {
            item_id,
            quantity,
            buffer,
            suggested_total: quantity + buffer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn archived_name_carries_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap();
        assert_eq!(
            archived_name("Folding Chair", at),
            "Folding Chair (archived 20240601T090507)"
        );
    }

    #[test]
    fn blank_names_and_negative_prices_are_rejected() {
        assert_matches!(non_empty_name("   "), Err(ServiceError::ValidationError(_)));
        assert_eq!(non_empty_name("  Uplight ").unwrap(), "Uplight");
        assert_matches!(non_negative_price(dec!(-0.01)), Err(ServiceError::ValidationError(_)));
        assert_eq!(non_negative_price(dec!(0)).unwrap(), dec!(0));
    }
}
