use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::quote::{self, QuoteStatus};
use crate::entities::quote_item;
use crate::errors::ServiceError;
use crate::handlers::common::{created, PaginationParams};
use crate::services::availability::QuoteRisk;
use crate::services::quotes::{
    AddQuoteItemRequest, ConfirmOutcome, CreateQuoteRequest, QuoteDetail, UpdateQuoteItemRequest,
};
use crate::services::rental_events::EventDetail;
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct QuoteFilter {
    /// Only quotes in this status
    pub status: Option<QuoteStatus>,
}

pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/:id", get(get_quote).delete(delete_quote))
        .route("/quotes/:id/items", post(add_quote_item))
        .route("/quotes/:id/confirm", post(confirm_quotation))
        .route("/quotes/:id/risk", get(quote_risk))
        .route("/quotes/:id/convert-to-event", post(convert_to_event))
        .route(
            "/quote-items/:id",
            put(update_quote_item).delete(delete_quote_item),
        )
}

/// List quotes
#[utoipa::path(
    get,
    path = "/api/v1/quotes",
    params(PaginationParams, QuoteFilter),
    responses(
        (status = 200, description = "Quotes", body = ApiResponse<PaginatedResponse<quote::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<PaginatedResponse<quote::Model>> {
    let tenant = user.tenant()?;
    let pagination = pagination.normalized();
    let (quotes, total) = state
        .services
        .quotes
        .list_quotes(&tenant, filter.status, pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        pagination.into_response(quotes, total),
    )))
}

/// Create a draft quote
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "Quote created", body = ApiResponse<quote::Model>),
        (status = 400, description = "Invalid quote", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let quote = state.services.quotes.create_quote(&tenant, request).await?;
    Ok(created(quote))
}

/// Get a quote with its lines and totals
#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote detail", body = ApiResponse<QuoteDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<QuoteDetail> {
    let tenant = user.tenant()?;
    let detail = state.services.quotes.get_quote(&tenant, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Delete a quote, returning accepted quantities to stock
#[utoipa::path(
    delete,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote deleted", body = ApiResponse<String>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<String> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    state.services.quotes.delete_quote(&tenant, id).await?;
    Ok(Json(ApiResponse::success(format!("Quote {} deleted", id))))
}

/// Add a line to a quote
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/items",
    params(("id" = Uuid, Path, description = "Quote id")),
    request_body = AddQuoteItemRequest,
    responses(
        (status = 201, description = "Line added", body = ApiResponse<quote_item::Model>),
        (status = 400, description = "Invalid line", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient availability", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn add_quote_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddQuoteItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let line = state
        .services
        .quotes
        .add_quote_item(&tenant, id, request)
        .await?;
    Ok(created(line))
}

/// Change a line's quantity
#[utoipa::path(
    put,
    path = "/api/v1/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Quote line id")),
    request_body = UpdateQuoteItemRequest,
    responses(
        (status = 200, description = "Line updated", body = ApiResponse<quote_item::Model>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient availability", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn update_quote_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuoteItemRequest>,
) -> ApiResult<quote_item::Model> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let line = state
        .services
        .quotes
        .update_quote_item(&tenant, id, request)
        .await?;
    Ok(Json(ApiResponse::success(line)))
}

/// Remove a line from a quote
#[utoipa::path(
    delete,
    path = "/api/v1/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Quote line id")),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<String>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn delete_quote_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<String> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    state.services.quotes.delete_quote_item(&tenant, id).await?;
    Ok(Json(ApiResponse::success(format!("Quote item {} deleted", id))))
}

/// Accept a draft quote and take its lines out of stock
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/confirm",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote accepted", body = ApiResponse<ConfirmOutcome>),
        (status = 400, description = "Quote is not a draft or is empty", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient availability", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn confirm_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ConfirmOutcome> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let outcome = state.services.quotes.confirm_quotation(&tenant, id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Risk level of every line and of the quote overall
#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}/risk",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote risk", body = ApiResponse<QuoteRisk>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn quote_risk(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<QuoteRisk> {
    let tenant = user.tenant()?;
    let risk = state.services.quotes.quote_risk(&tenant, id).await?;
    Ok(Json(ApiResponse::success(risk)))
}

/// Turn an accepted quote into a rental event
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/convert-to-event",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Event for the quote", body = ApiResponse<EventDetail>),
        (status = 400, description = "Quote is not accepted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "quotes"
)]
pub async fn convert_to_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<EventDetail> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let detail = state
        .services
        .rental_events
        .convert_quote_to_event(&tenant, id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}
