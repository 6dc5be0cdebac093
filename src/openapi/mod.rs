use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gearhouse API",
        version = "0.1.0",
        description = r#"
# Gearhouse Rental Inventory API

Items, quotes that hold stock for a date range, and the events accepted quotes turn into.

## Authentication

Every `/api/v1` endpoint except `/health` and `/status` needs a bearer token whose claims carry
`tenant_id` and `roles`. Writes require the `admin` role.

```
Authorization: Bearer <your-jwt-token>
```

## Availability

- Draft quotes are soft holds: they narrow what other overlapping quotes can add but do not touch stock.
- Accepted quotes are realized: their lines are taken out of stock and returned when shrunk or deleted.

## Errors

```json
{
  "success": false,
  "error": "Insufficient availability: Not enough stock for: Folding Chair",
  "details": ["Folding Chair"],
  "timestamp": "2024-06-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "inventory", description = "Items, serialized units and bulk stock"),
        (name = "quotes", description = "Quotes, quote lines, confirmation and risk"),
        (name = "events", description = "Rental events")
    ),
    paths(
        // Inventory
        crate::handlers::inventory::list_items,
        crate::handlers::inventory::create_item,
        crate::handlers::inventory::get_item,
        crate::handlers::inventory::update_item,
        crate::handlers::inventory::archive_item,
        crate::handlers::inventory::add_units,
        crate::handlers::inventory::set_unit_status,
        crate::handlers::inventory::set_stock,
        crate::handlers::inventory::availability,
        crate::handlers::inventory::buffer_suggestion,

        // Quotes
        crate::handlers::quotes::list_quotes,
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::delete_quote,
        crate::handlers::quotes::add_quote_item,
        crate::handlers::quotes::update_quote_item,
        crate::handlers::quotes::delete_quote_item,
        crate::handlers::quotes::confirm_quotation,
        crate::handlers::quotes::quote_risk,
        crate::handlers::quotes::convert_to_event,

        // Events
        crate::handlers::events::list_events,
        crate::handlers::events::create_event,
        crate::handlers::events::get_event,
    ),
    components(
        schemas(
            crate::entities::inventory_item::Model,
            crate::entities::inventory_unit::Model,
            crate::entities::inventory_unit::UnitStatus,
            crate::entities::inventory_stock::Model,
            crate::entities::quote::Model,
            crate::entities::quote::QuoteStatus,
            crate::entities::quote_item::Model,
            crate::entities::event::Model,
            crate::entities::event::EventStatus,
            crate::entities::event_inventory::Model,

            crate::services::inventory::CreateItemRequest,
            crate::services::inventory::UpdateItemRequest,
            crate::services::inventory::AddUnitsRequest,
            crate::services::inventory::SetUnitStatusRequest,
            crate::services::inventory::SetStockRequest,
            crate::services::inventory::BufferSuggestion,
            crate::services::availability::AvailabilityBreakdown,
            crate::services::availability::RiskLevel,
            crate::services::availability::LineRisk,
            crate::services::availability::QuoteRisk,
            crate::services::quotes::QuantityInput,
            crate::services::quotes::CreateQuoteRequest,
            crate::services::quotes::AddQuoteItemRequest,
            crate::services::quotes::UpdateQuoteItemRequest,
            crate::services::quotes::QuoteLine,
            crate::services::quotes::QuoteTotals,
            crate::services::quotes::QuoteDetail,
            crate::services::quotes::ConfirmOutcome,
            crate::services::rental_events::CreateEventRequest,
            crate::services::rental_events::EventDetail,
            crate::handlers::inventory::CreateItemResult,

            crate::errors::ItemErrorKind,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by every secured path.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
