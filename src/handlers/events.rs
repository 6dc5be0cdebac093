use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::event;
use crate::errors::ServiceError;
use crate::handlers::common::{created, PaginationParams};
use crate::services::rental_events::{CreateEventRequest, EventDetail};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/:id", get(get_event))
}

/// List rental events
#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(PaginationParams),
    responses(
        (status = 200, description = "Events", body = ApiResponse<PaginatedResponse<event::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<event::Model>> {
    let tenant = user.tenant()?;
    let pagination = pagination.normalized();
    let (events, total) = state
        .services
        .rental_events
        .list_events(&tenant, pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        pagination.into_response(events, total),
    )))
}

/// Create a rental event
#[utoipa::path(
    post,
    path = "/api/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = ApiResponse<event::Model>),
        (status = 400, description = "Invalid event", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Referenced quote not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let tenant = user.tenant()?;
    let event = state
        .services
        .rental_events
        .create_event(&tenant, request)
        .await?;
    Ok(created(event))
}

/// Get an event with its inventory lines
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event detail", body = ApiResponse<EventDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<EventDetail> {
    let tenant = user.tenant()?;
    let detail = state.services.rental_events.get_event(&tenant, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
