use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{inventory_item, inventory_stock, inventory_unit};
use crate::errors::{ItemErrorKind, ServiceError};
use crate::handlers::common::created;
use crate::services::availability::AvailabilityBreakdown;
use crate::services::inventory::{
    AddUnitsRequest, AvailabilityWindow, BufferSuggestion, CreateItemRequest, SetStockRequest,
    SetUnitStatusRequest, UpdateItemRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListItemsQuery {
    /// Include archived items
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Window start, `YYYY-MM-DD`
    pub start: Option<String>,
    /// Window end, `YYYY-MM-DD`
    pub end: Option<String>,
    /// Quote whose own lines are ignored
    pub exclude_quote_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BufferQuery {
    pub quantity: i64,
}

/// Result of item creation: either the item or a typed error kind.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateItemResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<inventory_item::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemErrorKind>,
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list_items).post(create_item))
        .route("/inventory/:id", get(get_item).put(update_item))
        .route("/inventory/:id/archive", post(archive_item))
        .route("/inventory/:id/units", post(add_units))
        .route("/inventory/:id/stock", put(set_stock))
        .route("/inventory/:id/availability", get(availability))
        .route("/inventory/:id/buffer", get(buffer_suggestion))
        .route("/inventory/units/:unit_id/status", put(set_unit_status))
}

/// List inventory items
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "Inventory items", body = ApiResponse<Vec<inventory_item::Model>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<Vec<inventory_item::Model>> {
    let tenant = user.tenant()?;
    let items = state
        .services
        .inventory
        .list_items(&tenant, query.include_archived)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Create an inventory item
///
/// Returns `{ ok, item }` on success or `{ ok: false, error }` where `error`
/// is `DUPLICATE_NAME`, `VALIDATION` or `UNKNOWN`.
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = CreateItemResult),
        (status = 400, description = "Invalid item", body = CreateItemResult),
        (status = 409, description = "Duplicate name", body = CreateItemResult),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateItemRequest>,
) -> Result<Response, ServiceError> {
    user.require_admin()?;
    let tenant = user.tenant()?;

    let response = match state.services.inventory.create_item(&tenant, request).await {
        Ok(item) => (
            StatusCode::CREATED,
            Json(CreateItemResult {
                ok: true,
                item: Some(item),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let kind = ItemErrorKind::from(&e);
            if kind == ItemErrorKind::Unknown {
                error!(error = %e, "inventory item creation failed");
            }
            (
                e.status_code(),
                Json(CreateItemResult {
                    ok: false,
                    item: None,
                    error: Some(kind),
                }),
            )
                .into_response()
        }
    };
    Ok(response)
}

/// Get an inventory item
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "Inventory item", body = ApiResponse<inventory_item::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn get_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory_item::Model> {
    let tenant = user.tenant()?;
    let item = state.services.inventory.get_item(&tenant, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Update an inventory item
#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<inventory_item::Model>),
        (status = 400, description = "Invalid change", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<inventory_item::Model> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let item = state
        .services
        .inventory
        .update_item(&tenant, id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Archive an inventory item
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/archive",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "Item archived", body = ApiResponse<inventory_item::Model>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn archive_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory_item::Model> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let item = state.services.inventory.archive_item(&tenant, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Add serialized units
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/units",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    request_body = AddUnitsRequest,
    responses(
        (status = 201, description = "Units created", body = ApiResponse<Vec<inventory_unit::Model>>),
        (status = 400, description = "Item is not serialized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn add_units(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddUnitsRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let units = state
        .services
        .inventory
        .add_units(&tenant, id, request)
        .await?;
    Ok(created(units))
}

/// Move a unit in or out of maintenance
#[utoipa::path(
    put,
    path = "/api/v1/inventory/units/{unit_id}/status",
    params(("unit_id" = Uuid, Path, description = "Unit id")),
    request_body = SetUnitStatusRequest,
    responses(
        (status = 200, description = "Unit updated", body = ApiResponse<inventory_unit::Model>),
        (status = 400, description = "Unit is out on a quote", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn set_unit_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(unit_id): Path<Uuid>,
    Json(request): Json<SetUnitStatusRequest>,
) -> ApiResult<inventory_unit::Model> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let unit = state
        .services
        .inventory
        .set_unit_status(&tenant, unit_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(unit)))
}

/// Set bulk stock counters
#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}/stock",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<inventory_stock::Model>),
        (status = 400, description = "Invalid counters", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStockRequest>,
) -> ApiResult<inventory_stock::Model> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let stock = state
        .services
        .inventory
        .set_stock(&tenant, id, request)
        .await?;
    Ok(Json(ApiResponse::success(stock)))
}

/// Availability breakdown, date-aware when `start` and `end` are given
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/availability",
    params(("id" = Uuid, Path, description = "Inventory item id"), AvailabilityQuery),
    responses(
        (status = 200, description = "Breakdown", body = ApiResponse<AvailabilityBreakdown>),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn availability(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityBreakdown> {
    let tenant = user.tenant()?;
    let window = AvailabilityWindow {
        start: query.start,
        end: query.end,
        exclude_quote_id: query.exclude_quote_id,
    };
    let breakdown = state
        .services
        .inventory
        .availability(&tenant, id, window)
        .await?;
    Ok(Json(ApiResponse::success(breakdown)))
}

/// Suggested safety buffer for a quantity
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/buffer",
    params(("id" = Uuid, Path, description = "Inventory item id"), BufferQuery),
    responses(
        (status = 200, description = "Suggestion", body = ApiResponse<BufferSuggestion>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn buffer_suggestion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<BufferQuery>,
) -> ApiResult<BufferSuggestion> {
    let tenant = user.tenant()?;
    let suggestion = state
        .services
        .inventory
        .buffer_suggestion(&tenant, id, query.quantity)
        .await?;
    Ok(Json(ApiResponse::success(suggestion)))
}
