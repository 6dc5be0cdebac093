use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::TenantContext;
use crate::entities::quote::{self, QuoteStatus};
use crate::entities::{inventory_item, quote_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::availability::{
    self, calculate_buffer_quantity, calculate_quote_risk, QuoteRisk, RiskInput,
};
use crate::services::ledger::{InventoryLedger, ItemLocks, LedgerMutation};
use crate::services::rental_events::RentalEventService;
use crate::services::reservations::{self, DateContext};
use crate::services::{commit, parse_range};

/// A quantity as submitted by a client: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum QuantityInput {
    Number(i64),
    Text(String),
}

impl QuantityInput {
    /// Parses into a positive quantity that fits the `quantity` column.
    pub fn parse(&self) -> Result<i32, ServiceError> {
        let value = match self {
            QuantityInput::Number(n) => *n,
            QuantityInput::Text(raw) => raw.trim().parse::<i64>().map_err(|_| {
                ServiceError::ValidationError(format!("Quantity '{}' is not a whole number", raw))
            })?,
        };

        if value <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        i32::try_from(value)
            .map_err(|_| ServiceError::ValidationError(format!("Quantity {} is too large", value)))
    }
}

impl From<i64> for QuantityInput {
    fn from(value: i64) -> Self {
        QuantityInput::Number(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuoteRequest {
    #[validate(length(min = 1, max = 200, message = "Quote name is required"))]
    pub name: String,
    pub customer_name: Option<String>,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`, not before `start_date`
    pub end_date: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddQuoteItemRequest {
    pub item_id: Uuid,
    pub quantity: QuantityInput,
    /// Overrides the item's current price for this line
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteItemRequest {
    pub quantity: QuantityInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteLine {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price_snapshot: Decimal,
    #[schema(value_type = String)]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteTotals {
    pub rental_days: i64,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteDetail {
    pub quote: quote::Model,
    pub items: Vec<QuoteLine>,
    pub totals: QuoteTotals,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmOutcome {
    pub quote: quote::Model,
    pub event_id: Option<Uuid>,
    /// Consumes that moved less than the confirmed quantity
    #[schema(value_type = Vec<Object>)]
    pub shortfalls: Vec<LedgerMutation>,
}

/// Billable days for a rental window; same-day rentals bill one day.
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

pub fn line_total(quantity: i32, unit_price: Decimal, days: i64) -> Decimal {
    Decimal::from(quantity) * unit_price * Decimal::from(days)
}

/// Sums line quantities per item, in item id order.
fn quantities_by_item(lines: &[quote_item::Model]) -> BTreeMap<Uuid, i64> {
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals.entry(line.item_id).or_insert(0) += i64::from(line.quantity);
    }
    totals
}

async fn find_quote<C>(conn: &C, tenant_id: Uuid, quote_id: Uuid) -> Result<quote::Model, ServiceError>
where
    C: ConnectionTrait,
{
    quote::Entity::find_by_id(quote_id)
        .filter(quote::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))
}

async fn find_line<C>(conn: &C, tenant_id: Uuid, line_id: Uuid) -> Result<quote_item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    quote_item::Entity::find_by_id(line_id)
        .filter(quote_item::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", line_id)))
}

async fn quote_lines<C>(conn: &C, tenant_id: Uuid, quote_id: Uuid) -> Result<Vec<quote_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    quote_item::Entity::find()
        .filter(quote_item::Column::TenantId.eq(tenant_id))
        .filter(quote_item::Column::QuoteId.eq(quote_id))
        .order_by_asc(quote_item::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

async fn items_by_id<C>(
    conn: &C,
    tenant_id: Uuid,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, inventory_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let items = inventory_item::Entity::find()
        .filter(inventory_item::Column::TenantId.eq(tenant_id))
        .filter(inventory_item::Column::Id.is_in(ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(items.into_iter().map(|item| (item.id, item)).collect())
}

/// How much of `item` the quote may still take: the date-aware gate minus
/// what the quote already holds of the item on other lines.
async fn remaining_for_quote<C>(
    conn: &C,
    tenant_id: Uuid,
    quote: &quote::Model,
    item: &inventory_item::Model,
    except_line: Option<Uuid>,
) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let ctx = DateContext::for_quote(quote);
    let breakdown =
        availability::item_availability_breakdown(conn, tenant_id, item, Some(&ctx)).await?;
    let held =
        reservations::quantity_held_in_quote(conn, tenant_id, quote.id, item.id, except_line).await?;
    Ok((breakdown.gate() - held).max(0))
}

fn reject_if_short(item: &inventory_item::Model, wanted: i64, remaining: i64) -> Result<(), ServiceError> {
    if wanted > remaining {
        return Err(ServiceError::insufficient(
            format!(
                "{} needs {}, only {} available for these dates",
                item.name, wanted, remaining
            ),
            wanted - remaining,
            vec![item.name.clone()],
        ));
    }
    Ok(())
}

/// Owns the quote lifecycle and keeps the inventory ledger in step with it.
///
/// Draft lines are soft reservations: they are checked against effective
/// availability when written and never touch the ledger. Accepted lines are
/// realized: confirming consumes their quantity, and later changes consume
/// or release the difference.
///
/// Each operation takes the quote's lock, then the locks of every item it
/// touches, then runs in a single transaction.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    ledger: Arc<InventoryLedger>,
    locks: Arc<ItemLocks>,
    event_sender: Arc<EventSender>,
    rental_events: Arc<RentalEventService>,
}

impl QuoteService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: Arc<InventoryLedger>,
        locks: Arc<ItemLocks>,
        event_sender: Arc<EventSender>,
        rental_events: Arc<RentalEventService>,
    ) -> Self {
        Self {
            db,
            ledger,
            locks,
            event_sender,
            rental_events,
        }
    }

    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id, name = %request.name))]
    pub async fn create_quote(
        &self,
        tenant: &TenantContext,
        request: CreateQuoteRequest,
    ) -> Result<quote::Model, ServiceError> {
        request.validate()?;
        let range = parse_range(&request.start_date, &request.end_date)?;

        let model = quote::ActiveModel {
            tenant_id: Set(tenant.tenant_id),
            name: Set(request.name.trim().to_string()),
            customer_name: Set(request.customer_name),
            start_date: Set(range.start),
            end_date: Set(range.end),
            status: Set(QuoteStatus::Draft),
            event_id: Set(None),
            notes: Set(request.notes),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(quote_id = %model.id, "quote created");
        Ok(model)
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn get_quote(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
    ) -> Result<QuoteDetail, ServiceError> {
        let db = &*self.db;
        let quote = find_quote(db, tenant.tenant_id, quote_id).await?;
        let lines = quote_lines(db, tenant.tenant_id, quote_id).await?;
        let items = items_by_id(db, tenant.tenant_id, lines.iter().map(|l| l.item_id)).await?;

        let days = rental_days(quote.start_date, quote.end_date);
        let lines: Vec<QuoteLine> = lines
            .into_iter()
            .map(|line| QuoteLine {
                id: line.id,
                item_id: line.item_id,
                item_name: items.get(&line.item_id).map(|i| i.name.clone()),
                quantity: line.quantity,
                unit_price_snapshot: line.unit_price_snapshot,
                line_total: line_total(line.quantity, line.unit_price_snapshot, days),
            })
            .collect();
        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();

        Ok(QuoteDetail {
            quote,
            items: lines,
            totals: QuoteTotals {
                rental_days: days,
                subtotal,
            },
        })
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn list_quotes(
        &self,
        tenant: &TenantContext,
        status: Option<QuoteStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<quote::Model>, u64), ServiceError> {
        let mut query = quote::Entity::find().filter(quote::Column::TenantId.eq(tenant.tenant_id));
        if let Some(status) = status {
            query = query.filter(quote::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_asc(quote::Column::StartDate)
            .order_by_asc(quote::Column::CreatedAt)
            .paginate(&*self.db, limit.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let quotes = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((quotes, total))
    }

    /// Adds a line. Draft quotes only record it as a soft hold. A line added
    /// to an accepted quote is realized immediately: its quantity is consumed
    /// from the ledger, and the add fails as a whole if the ledger is short.
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id, item_id = %request.item_id))]
    pub async fn add_quote_item(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
        request: AddQuoteItemRequest,
    ) -> Result<quote_item::Model, ServiceError> {
        let quantity = request.quantity.parse()?;
        if let Some(price) = request.unit_price {
            if price.is_sign_negative() {
                return Err(ServiceError::ValidationError(
                    "Unit price cannot be negative".to_string(),
                ));
            }
        }

        let _quote_guard = self.locks.acquire([quote_id]).await;
        let _item_guard = self.locks.acquire([request.item_id]).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let quote = find_quote(&txn, tenant.tenant_id, quote_id).await?;
        let item = availability::find_item(&txn, tenant.tenant_id, request.item_id).await?;
        if !item.active {
            return Err(ServiceError::ValidationError(format!(
                "Inventory item '{}' is archived",
                item.name
            )));
        }

        let remaining = remaining_for_quote(&txn, tenant.tenant_id, &quote, &item, None).await?;
        reject_if_short(&item, i64::from(quantity), remaining)?;

        let line = quote_item::ActiveModel {
            tenant_id: Set(tenant.tenant_id),
            quote_id: Set(quote.id),
            item_id: Set(item.id),
            quantity: Set(quantity),
            unit_price_snapshot: Set(request.unit_price.unwrap_or(item.price)),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        if quote.status.holds_ledger() {
            let mutation = self
                .ledger
                .consume(&txn, tenant, &item, i64::from(quantity), Some(quote.id))
                .await?;
            if mutation.is_shortfall() {
                return Err(ServiceError::insufficient(
                    format!("{} could only reserve {} of {}", item.name, mutation.applied, mutation.requested),
                    mutation.missing(),
                    vec![item.name.clone()],
                ));
            }
        }

        commit(txn, "add_quote_item").await?;
        info!(quote_id = %quote.id, line_id = %line.id, quantity, "quote item added");
        Ok(line)
    }

    /// Changes a line's quantity. On an accepted quote the difference is
    /// consumed or released; on any other quote growth is only checked.
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id))]
    pub async fn update_quote_item(
        &self,
        tenant: &TenantContext,
        line_id: Uuid,
        request: UpdateQuoteItemRequest,
    ) -> Result<quote_item::Model, ServiceError> {
        let new_quantity = request.quantity.parse()?;

        let existing = find_line(&*self.db, tenant.tenant_id, line_id).await?;
        let _quote_guard = self.locks.acquire([existing.quote_id]).await;
        let _item_guard = self.locks.acquire([existing.item_id]).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let line = find_line(&txn, tenant.tenant_id, line_id).await?;
        let quote = find_quote(&txn, tenant.tenant_id, line.quote_id).await?;
        let item = availability::find_item(&txn, tenant.tenant_id, line.item_id).await?;

        let old_quantity = line.quantity;
        let delta = i64::from(new_quantity) - i64::from(old_quantity);
        let mut shortfalls = Vec::new();

        if quote.status.holds_ledger() {
            if delta < 0 {
                let mutation = self
                    .ledger
                    .release(&txn, tenant, &item, -delta, Some(quote.id))
                    .await?;
                if mutation.is_shortfall() {
                    shortfalls.push(mutation);
                }
            } else if delta > 0 {
                let remaining =
                    remaining_for_quote(&txn, tenant.tenant_id, &quote, &item, Some(line.id)).await?;
                reject_if_short(&item, delta, remaining)?;

                let mutation = self
                    .ledger
                    .consume(&txn, tenant, &item, delta, Some(quote.id))
                    .await?;
                if mutation.is_shortfall() {
                    return Err(ServiceError::insufficient(
                        format!("{} could only reserve {} of {}", item.name, mutation.applied, mutation.requested),
                        mutation.missing(),
                        vec![item.name.clone()],
                    ));
                }
            }
        } else if delta > 0 {
            // Draft lines are checked only when they grow; a shrink always succeeds.
            let remaining =
                remaining_for_quote(&txn, tenant.tenant_id, &quote, &item, Some(line.id)).await?;
            reject_if_short(&item, i64::from(new_quantity), remaining)?;
        }

        let mut active: quote_item::ActiveModel = line.into();
        active.quantity = Set(new_quantity);
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        commit(txn, "update_quote_item").await?;
        self.publish_shortfalls(tenant, Some(quote.id), &shortfalls).await;

        info!(
            quote_id = %quote.id,
            %line_id,
            old_quantity,
            new_quantity,
            status = %quote.status,
            "quote item updated"
        );
        Ok(updated)
    }

    /// Removes a line. An accepted quote releases the full quantity first; a
    /// short release is logged and the line is still removed.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn delete_quote_item(
        &self,
        tenant: &TenantContext,
        line_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = find_line(&*self.db, tenant.tenant_id, line_id).await?;
        let _quote_guard = self.locks.acquire([existing.quote_id]).await;
        let _item_guard = self.locks.acquire([existing.item_id]).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let line = find_line(&txn, tenant.tenant_id, line_id).await?;
        let quote = find_quote(&txn, tenant.tenant_id, line.quote_id).await?;

        let mut shortfalls = Vec::new();
        if quote.status.holds_ledger() {
            match availability::find_item(&txn, tenant.tenant_id, line.item_id).await {
                Ok(item) => {
                    let mutation = self
                        .ledger
                        .release(&txn, tenant, &item, i64::from(line.quantity), Some(quote.id))
                        .await?;
                    if mutation.is_shortfall() {
                        shortfalls.push(mutation);
                    }
                }
                Err(ServiceError::NotFound(_)) => {
                    warn!(item_id = %line.item_id, "item missing; nothing to release");
                }
                Err(e) => return Err(e),
            }
        }

        quote_item::Entity::delete_by_id(line.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        commit(txn, "delete_quote_item").await?;
        self.publish_shortfalls(tenant, Some(quote.id), &shortfalls).await;

        info!(quote_id = %quote.id, %line_id, "quote item deleted");
        Ok(())
    }

    /// Moves a draft quote to accepted and consumes every line from the
    /// ledger. Availability of all items is checked before anything is
    /// written; one short item rejects the whole confirmation.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn confirm_quotation(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let quote_guard = self.locks.acquire([quote_id]).await;

        let lines = quote_lines(&*self.db, tenant.tenant_id, quote_id).await?;
        let item_guard = self.locks.acquire(lines.iter().map(|l| l.item_id)).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let quote = find_quote(&txn, tenant.tenant_id, quote_id).await?;
        if quote.status != QuoteStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote {} is {}; only draft quotes can be confirmed",
                quote.id, quote.status
            )));
        }

        let lines = quote_lines(&txn, tenant.tenant_id, quote_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Quote has no items to confirm".to_string(),
            ));
        }

        let required = quantities_by_item(&lines);
        let items = items_by_id(&txn, tenant.tenant_id, required.keys().copied()).await?;
        let ctx = DateContext::for_quote(&quote);

        let mut short_names = Vec::new();
        let mut total_shortfall = 0;
        for (item_id, wanted) in &required {
            let item = items.get(item_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory item {} not found", item_id))
            })?;
            let breakdown =
                availability::item_availability_breakdown(&txn, tenant.tenant_id, item, Some(&ctx))
                    .await?;
            if *wanted > breakdown.gate() {
                total_shortfall += wanted - breakdown.gate();
                short_names.push(item.name.clone());
            }
        }

        if !short_names.is_empty() {
            return Err(ServiceError::insufficient(
                format!("Not enough stock for: {}", short_names.join(", ")),
                total_shortfall,
                short_names,
            ));
        }

        for item in items.values().filter(|i| !i.is_serialized) {
            if self
                .ledger
                .stock_record(&txn, tenant.tenant_id, item.id)
                .await?
                .is_none()
            {
                return Err(ServiceError::ValidationError(format!(
                    "Inventory item '{}' has no stock record; set its stock before confirming",
                    item.name
                )));
            }
        }

        let mut active: quote::ActiveModel = quote.into();
        active.status = Set(QuoteStatus::Accepted);
        let accepted = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let mut shortfalls = Vec::new();
        for (item_id, wanted) in &required {
            if let Some(item) = items.get(item_id) {
                let mutation = self
                    .ledger
                    .consume(&txn, tenant, item, *wanted, Some(accepted.id))
                    .await?;
                if mutation.is_shortfall() {
                    shortfalls.push(mutation);
                }
            }
        }

        commit(txn, "confirm_quotation").await?;
        drop(item_guard);
        drop(quote_guard);

        info!(quote_id = %accepted.id, lines = lines.len(), "quote confirmed");
        self.publish_shortfalls(tenant, Some(accepted.id), &shortfalls).await;

        let (quote, event_id) = match self.rental_events.promote_quote(tenant, &accepted).await {
            Ok(event) => {
                let quote = quote::Model {
                    event_id: Some(event.id),
                    ..accepted
                };
                (quote, Some(event.id))
            }
            Err(e) => {
                warn!(quote_id = %accepted.id, error = %e, "quote confirmed but event promotion failed");
                (accepted, None)
            }
        };

        self.event_sender
            .send_or_log(Event::QuoteConfirmed {
                tenant_id: tenant.tenant_id,
                quote_id: quote.id,
                event_id,
            })
            .await;

        Ok(ConfirmOutcome {
            quote,
            event_id,
            shortfalls,
        })
    }

    /// Deletes a quote and its lines. An accepted quote returns every line's
    /// quantity to the ledger first.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn delete_quote(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
    ) -> Result<(), ServiceError> {
        let _quote_guard = self.locks.acquire([quote_id]).await;

        let lines = quote_lines(&*self.db, tenant.tenant_id, quote_id).await?;
        let _item_guard = self.locks.acquire(lines.iter().map(|l| l.item_id)).await;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let quote = find_quote(&txn, tenant.tenant_id, quote_id).await?;
        let was_accepted = quote.status.holds_ledger();

        let mut shortfalls = Vec::new();
        if was_accepted {
            let lines = quote_lines(&txn, tenant.tenant_id, quote_id).await?;
            let held = quantities_by_item(&lines);
            let items = items_by_id(&txn, tenant.tenant_id, held.keys().copied()).await?;

            for (item_id, quantity) in &held {
                let Some(item) = items.get(item_id) else {
                    warn!(%item_id, "item missing; nothing to release");
                    continue;
                };
                let mutation = self
                    .ledger
                    .release(&txn, tenant, item, *quantity, Some(quote.id))
                    .await?;
                if mutation.is_shortfall() {
                    shortfalls.push(mutation);
                }
            }
        }

        quote_item::Entity::delete_many()
            .filter(quote_item::Column::TenantId.eq(tenant.tenant_id))
            .filter(quote_item::Column::QuoteId.eq(quote.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        quote::Entity::delete_by_id(quote.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        commit(txn, "delete_quote").await?;

        info!(%quote_id, was_accepted, "quote deleted");
        self.publish_shortfalls(tenant, Some(quote_id), &shortfalls).await;
        self.event_sender
            .send_or_log(Event::QuoteDeleted {
                tenant_id: tenant.tenant_id,
                quote_id,
                was_accepted,
            })
            .await;

        Ok(())
    }

    /// Green, yellow or red for the whole quote, judged line by line
    /// against date-aware availability plus the suggested buffer.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn quote_risk(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
    ) -> Result<QuoteRisk, ServiceError> {
        let db = &*self.db;
        let quote = find_quote(db, tenant.tenant_id, quote_id).await?;
        let lines = quote_lines(db, tenant.tenant_id, quote_id).await?;
        let items = items_by_id(db, tenant.tenant_id, lines.iter().map(|l| l.item_id)).await?;
        let ctx = DateContext::for_quote(&quote);

        let breakdowns = futures::future::try_join_all(lines.iter().map(|line| {
            let item = items.get(&line.item_id);
            let ctx = &ctx;
            async move {
                match item {
                    Some(item) => availability::item_availability_breakdown(
                        db,
                        tenant.tenant_id,
                        item,
                        Some(ctx),
                    )
                    .await
                    .map(Some),
                    None => Ok(None),
                }
            }
        }))
        .await?;

        let inputs: Vec<RiskInput> = lines
            .iter()
            .zip(breakdowns)
            .map(|(line, breakdown)| {
                let quantity = i64::from(line.quantity);
                let item = items.get(&line.item_id);
                let buffer = match (item, &breakdown) {
                    (Some(item), Some(b)) => calculate_buffer_quantity(item.is_serialized, b.total, quantity),
                    _ => 0,
                };
                RiskInput {
                    item_id: line.item_id,
                    item_name: item
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| line.item_id.to_string()),
                    quantity,
                    buffer,
                    breakdown,
                }
            })
            .collect();

        Ok(calculate_quote_risk(&inputs))
    }

    async fn publish_shortfalls(
        &self,
        tenant: &TenantContext,
        quote_id: Option<Uuid>,
        shortfalls: &[LedgerMutation],
    ) {
        for m in shortfalls {
            self.event_sender
                .send_or_log(Event::LedgerShortfall {
                    tenant_id: tenant.tenant_id,
                    item_id: m.item_id,
                    quote_id,
                    requested: m.requested,
                    applied: m.applied,
                })
                .await;
        }
    }
}
