use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::TenantContext;
use crate::entities::event::{self, EventStatus};
use crate::entities::quote::{self, QuoteStatus};
use crate::entities::{event_inventory, quote_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::ledger::ItemLocks;
use crate::services::{commit, parse_range};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Event name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub quote_id: Option<Uuid>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDetail {
    pub event: event::Model,
    pub inventory: Vec<event_inventory::Model>,
}

/// Rental events and the one-time copy of a quote's lines into them.
#[derive(Clone)]
pub struct RentalEventService {
    db: Arc<DatabaseConnection>,
    locks: Arc<ItemLocks>,
    event_sender: Arc<EventSender>,
}

impl RentalEventService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: Arc<ItemLocks>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            locks,
            event_sender,
        }
    }

    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id, name = %request.name))]
    pub async fn create_event(
        &self,
        tenant: &TenantContext,
        request: CreateEventRequest,
    ) -> Result<event::Model, ServiceError> {
        request.validate()?;
        let range = parse_range(&request.start_date, &request.end_date)?;

        if let Some(quote_id) = request.quote_id {
            let exists = quote::Entity::find_by_id(quote_id)
                .filter(quote::Column::TenantId.eq(tenant.tenant_id))
                .count(&*self.db)
                .await
                .map_err(ServiceError::db_error)?;
            if exists == 0 {
                return Err(ServiceError::NotFound(format!("Quote {} not found", quote_id)));
            }
        }

        let model = event::ActiveModel {
            tenant_id: Set(tenant.tenant_id),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            start_date: Set(range.start),
            end_date: Set(range.end),
            quote_id: Set(request.quote_id),
            status: Set(request.status.unwrap_or(EventStatus::Confirmed)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(event_id = %model.id, "event created");
        Ok(model)
    }

    /// Manual conversion of an accepted quote. Safe to repeat.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn convert_quote_to_event(
        &self,
        tenant: &TenantContext,
        quote_id: Uuid,
    ) -> Result<EventDetail, ServiceError> {
        let quote = quote::Entity::find_by_id(quote_id)
            .filter(quote::Column::TenantId.eq(tenant.tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        if quote.status != QuoteStatus::Accepted {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote {} is {}; only accepted quotes become events",
                quote.id, quote.status
            )));
        }

        let event = self.promote_quote(tenant, &quote).await?;
        self.get_event(tenant, event.id).await
    }

    /// Finds or creates the event for an accepted quote, links the quote to
    /// it, and copies the quote's lines into the event unless the event
    /// already has inventory rows.
    #[instrument(skip(self, tenant, quote), fields(tenant_id = %tenant.tenant_id, quote_id = %quote.id))]
    pub async fn promote_quote(
        &self,
        tenant: &TenantContext,
        quote: &quote::Model,
    ) -> Result<event::Model, ServiceError> {
        let _guard = self.locks.acquire([quote.id]).await;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let existing = event::Entity::find()
            .filter(event::Column::TenantId.eq(tenant.tenant_id))
            .filter(event::Column::QuoteId.eq(quote.id))
            .order_by_asc(event::Column::CreatedAt)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let event = match existing {
            Some(event) => event,
            None => event::ActiveModel {
                tenant_id: Set(tenant.tenant_id),
                name: Set(quote.name.clone()),
                description: Set(quote.notes.clone()),
                start_date: Set(quote.start_date),
                end_date: Set(quote.end_date),
                quote_id: Set(Some(quote.id)),
                status: Set(EventStatus::Confirmed),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?,
        };

        if quote.event_id != Some(event.id) {
            let mut link: quote::ActiveModel = quote.clone().into();
            link.event_id = Set(Some(event.id));
            link.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        let already_copied = event_inventory::Entity::find()
            .filter(event_inventory::Column::TenantId.eq(tenant.tenant_id))
            .filter(event_inventory::Column::EventId.eq(event.id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut lines_copied = 0;
        if already_copied == 0 {
            let lines = quote_item::Entity::find()
                .filter(quote_item::Column::TenantId.eq(tenant.tenant_id))
                .filter(quote_item::Column::QuoteId.eq(quote.id))
                .order_by_asc(quote_item::Column::CreatedAt)
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            for line in &lines {
                event_inventory::ActiveModel {
                    tenant_id: Set(tenant.tenant_id),
                    event_id: Set(event.id),
                    item_id: Set(line.item_id),
                    quantity: Set(line.quantity),
                    unit_price_snapshot: Set(line.unit_price_snapshot),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            }
            lines_copied = lines.len();
        }

        commit(txn, "promote_quote").await?;

        info!(event_id = %event.id, lines_copied, "quote promoted to event");
        self.event_sender
            .send_or_log(Event::EventPromoted {
                tenant_id: tenant.tenant_id,
                event_id: event.id,
                quote_id: quote.id,
                lines_copied,
            })
            .await;

        Ok(event)
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn get_event(
        &self,
        tenant: &TenantContext,
        event_id: Uuid,
    ) -> Result<EventDetail, ServiceError> {
        let db = &*self.db;
        let event = event::Entity::find_by_id(event_id)
            .filter(event::Column::TenantId.eq(tenant.tenant_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Event {} not found", event_id)))?;

        let inventory = event_inventory::Entity::find()
            .filter(event_inventory::Column::TenantId.eq(tenant.tenant_id))
            .filter(event_inventory::Column::EventId.eq(event.id))
            .order_by_asc(event_inventory::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(EventDetail { event, inventory })
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id))]
    pub async fn list_events(
        &self,
        tenant: &TenantContext,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<event::Model>, u64), ServiceError> {
        let paginator = event::Entity::find()
            .filter(event::Column::TenantId.eq(tenant.tenant_id))
            .order_by_asc(event::Column::StartDate)
            .paginate(&*self.db, limit.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let events = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((events, total))
    }
}
