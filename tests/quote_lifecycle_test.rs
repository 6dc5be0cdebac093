mod common;

use assert_matches::assert_matches;
use common::TestApp;
use gearhouse_api::entities::quote::QuoteStatus;
use gearhouse_api::errors::ServiceError;
use gearhouse_api::services::inventory::AvailabilityWindow;
use gearhouse_api::services::quotes::{
    AddQuoteItemRequest, CreateQuoteRequest, QuantityInput, UpdateQuoteItemRequest,
};
use gearhouse_api::entities::event_inventory;
use gearhouse_api::services::rental_events::CreateEventRequest;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

fn quote_request(name: &str, start: &str, end: &str) -> CreateQuoteRequest {
    CreateQuoteRequest {
        name: name.to_string(),
        customer_name: Some("Riverside Weddings".to_string()),
        start_date: start.to_string(),
        end_date: end.to_string(),
        notes: None,
    }
}

fn line(item_id: Uuid, quantity: i64) -> AddQuoteItemRequest {
    AddQuoteItemRequest {
        item_id,
        quantity: QuantityInput::from(quantity),
        unit_price: None,
    }
}

#[tokio::test]
async fn bulk_item_walkthrough_matches_ledger() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let inventory = &app.services().inventory;
    let quotes = &app.services().quotes;

    let chairs = app.bulk_item("Folding Chair", 10, 2).await;

    let fresh = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(fresh.total, 10);
    assert_eq!(fresh.out_of_service, 2);
    assert_eq!(fresh.in_transit, 0);
    assert_eq!(fresh.available, 8);
    assert_eq!(fresh.reserved, 0);
    assert_eq!(fresh.effective_available, None);

    // Draft lines hold nothing in the ledger.
    let q1 = quotes
        .create_quote(tenant, quote_request("Q1", "2024-06-01", "2024-06-05"))
        .await
        .unwrap();
    let q1_line = quotes
        .add_quote_item(tenant, q1.id, line(chairs.id, 5))
        .await
        .unwrap();
    assert_eq!(q1_line.unit_price_snapshot, dec!(12.50));

    let after_draft = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(after_draft.total, 10);
    assert_eq!(after_draft.reserved, 5);

    // Overlapping draft sees Q1's soft hold.
    let q2 = quotes
        .create_quote(tenant, quote_request("Q2", "2024-06-03", "2024-06-07"))
        .await
        .unwrap();
    let window = inventory
        .availability(
            tenant,
            chairs.id,
            AvailabilityWindow {
                start: Some("2024-06-03".into()),
                end: Some("2024-06-07".into()),
                exclude_quote_id: Some(q2.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(window.reserved_in_overlapping_events, Some(5));
    assert_eq!(window.effective_available, Some(3));

    let rejected = quotes.add_quote_item(tenant, q2.id, line(chairs.id, 5)).await;
    assert_matches!(
        rejected,
        Err(ServiceError::InsufficientAvailability { shortfall: 2, ref items, .. }) if items == &vec!["Folding Chair".to_string()]
    );
    assert!(quotes.get_quote(tenant, q2.id).await.unwrap().items.is_empty());

    // Confirm consumes Q1's quantity.
    let outcome = quotes.confirm_quotation(tenant, q1.id).await.unwrap();
    assert_eq!(outcome.quote.status, QuoteStatus::Accepted);
    assert!(outcome.shortfalls.is_empty());
    assert!(outcome.event_id.is_some());

    let confirmed = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(confirmed.total, 5);
    assert_eq!(confirmed.available, 3);

    // Shrinking an accepted line releases the difference.
    quotes
        .update_quote_item(
            tenant,
            q1_line.id,
            UpdateQuoteItemRequest {
                quantity: QuantityInput::Text("3".into()),
            },
        )
        .await
        .unwrap();
    let shrunk = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(shrunk.total, 7);

    // Deleting the accepted quote restores everything.
    quotes.delete_quote(tenant, q1.id).await.unwrap();
    let restored = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(restored.total, 10);
    assert_eq!(restored.available, 8);

    // A second delete finds nothing and releases nothing.
    assert_matches!(
        quotes.delete_quote(tenant, q1.id).await,
        Err(ServiceError::NotFound(_))
    );
    let still = inventory
        .availability(tenant, chairs.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(still.total, 10);
}

#[tokio::test]
async fn confirm_rejects_whole_quote_when_any_item_is_short() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;

    let tables = app.bulk_item("Banquet Table", 4, 0).await;
    let linens = app.bulk_item("Linen", 20, 0).await;

    let quote = quotes
        .create_quote(tenant, quote_request("Gala", "2024-07-10", "2024-07-12"))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(linens.id, 10))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(tables.id, 4))
        .await
        .unwrap();

    // Stock drops underneath the draft.
    app.services()
        .inventory
        .set_stock(
            tenant,
            tables.id,
            gearhouse_api::services::inventory::SetStockRequest {
                total_quantity: 4,
                out_of_service_quantity: 2,
            },
        )
        .await
        .unwrap();

    let err = quotes.confirm_quotation(tenant, quote.id).await.unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientAvailability { ref message, ref items, .. }
            if message == "Not enough stock for: Banquet Table" && items.len() == 1
    );

    // Nothing was consumed and the quote is still a draft.
    let detail = quotes.get_quote(tenant, quote.id).await.unwrap();
    assert_eq!(detail.quote.status, QuoteStatus::Draft);
    let linen_stock = app
        .services()
        .inventory
        .availability(tenant, linens.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(linen_stock.total, 20);
}

#[tokio::test]
async fn confirm_requires_a_draft_with_lines() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;

    let empty = quotes
        .create_quote(tenant, quote_request("Empty", "2024-08-01", "2024-08-02"))
        .await
        .unwrap();
    assert_matches!(
        quotes.confirm_quotation(tenant, empty.id).await,
        Err(ServiceError::ValidationError(_))
    );

    let lights = app.bulk_item("Uplight", 12, 0).await;
    quotes
        .add_quote_item(tenant, empty.id, line(lights.id, 2))
        .await
        .unwrap();
    quotes.confirm_quotation(tenant, empty.id).await.unwrap();

    assert_matches!(
        quotes.confirm_quotation(tenant, empty.id).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn accepted_quote_consumes_added_lines_immediately() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;
    let inventory = &app.services().inventory;

    let stage = app.bulk_item("Stage Deck", 8, 0).await;
    let quote = quotes
        .create_quote(tenant, quote_request("Festival", "2024-09-01", "2024-09-03"))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(stage.id, 2))
        .await
        .unwrap();
    quotes.confirm_quotation(tenant, quote.id).await.unwrap();

    quotes
        .add_quote_item(tenant, quote.id, line(stage.id, 1))
        .await
        .unwrap();
    let after = inventory
        .availability(tenant, stage.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(after.total, 5);

    // Deleting one line returns only that line's quantity.
    let detail = quotes.get_quote(tenant, quote.id).await.unwrap();
    let single = detail.items.iter().find(|l| l.quantity == 1).unwrap();
    quotes.delete_quote_item(tenant, single.id).await.unwrap();
    let after_delete = inventory
        .availability(tenant, stage.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(after_delete.total, 6);
}

#[tokio::test]
async fn quote_totals_bill_at_least_one_day() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;

    let chairs = app.bulk_item("Chiavari Chair", 100, 0).await;
    let same_day = quotes
        .create_quote(tenant, quote_request("Brunch", "2024-05-05", "2024-05-05"))
        .await
        .unwrap();
    quotes
        .add_quote_item(
            tenant,
            same_day.id,
            AddQuoteItemRequest {
                item_id: chairs.id,
                quantity: QuantityInput::from(10),
                unit_price: Some(dec!(4.25)),
            },
        )
        .await
        .unwrap();

    let detail = quotes.get_quote(tenant, same_day.id).await.unwrap();
    assert_eq!(detail.totals.rental_days, 1);
    assert_eq!(detail.totals.subtotal, dec!(42.50));
    assert_eq!(detail.items[0].item_name.as_deref(), Some("Chiavari Chair"));

    let week = quotes
        .create_quote(tenant, quote_request("Expo", "2024-05-10", "2024-05-17"))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, week.id, line(chairs.id, 2))
        .await
        .unwrap();
    let detail = quotes.get_quote(tenant, week.id).await.unwrap();
    assert_eq!(detail.totals.rental_days, 7);
    assert_eq!(detail.totals.subtotal, dec!(175.00));
}

#[tokio::test]
async fn invalid_quantities_and_dates_are_rejected() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;

    assert_matches!(
        quotes
            .create_quote(tenant, quote_request("Backwards", "2024-06-05", "2024-06-01"))
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let chairs = app.bulk_item("Bistro Chair", 10, 0).await;
    let quote = quotes
        .create_quote(tenant, quote_request("Picnic", "2024-06-01", "2024-06-02"))
        .await
        .unwrap();

    for bad in [QuantityInput::from(0), QuantityInput::Text("two".into())] {
        let result = quotes
            .add_quote_item(
                tenant,
                quote.id,
                AddQuoteItemRequest {
                    item_id: chairs.id,
                    quantity: bad,
                    unit_price: None,
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    assert_matches!(
        quotes
            .add_quote_item(tenant, quote.id, line(Uuid::new_v4(), 1))
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn promotion_is_idempotent() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;
    let events = &app.services().rental_events;

    let tents = app.bulk_item("Frame Tent", 3, 0).await;
    let speakers = app.bulk_item("Speaker", 6, 0).await;
    let quote = quotes
        .create_quote(tenant, quote_request("Fair", "2024-10-01", "2024-10-04"))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(tents.id, 2))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(speakers.id, 4))
        .await
        .unwrap();

    // Draft quotes cannot be converted.
    assert_matches!(
        events.convert_quote_to_event(tenant, quote.id).await,
        Err(ServiceError::InvalidOperation(_))
    );

    let outcome = quotes.confirm_quotation(tenant, quote.id).await.unwrap();
    let event_id = outcome.event_id.expect("confirm promotes the quote");
    assert_eq!(outcome.quote.event_id, Some(event_id));

    let first = events.convert_quote_to_event(tenant, quote.id).await.unwrap();
    let second = events.convert_quote_to_event(tenant, quote.id).await.unwrap();
    assert_eq!(first.event.id, event_id);
    assert_eq!(second.event.id, event_id);
    assert_eq!(second.inventory.len(), 2);

    let (listed, total) = events.list_events(tenant, 1, 20).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(listed[0].quote_id, Some(quote.id));
}

#[tokio::test]
async fn promotion_ignores_rows_from_other_tenants() {
    let app = TestApp::new().await;
    let tenant = &app.tenant;
    let quotes = &app.services().quotes;
    let events = &app.services().rental_events;

    let lights = app.bulk_item("Uplight", 12, 0).await;
    let quote = quotes
        .create_quote(tenant, quote_request("Launch", "2024-11-12", "2024-11-13"))
        .await
        .unwrap();
    quotes
        .add_quote_item(tenant, quote.id, line(lights.id, 6))
        .await
        .unwrap();

    // The event exists before confirmation, and a stray row from another
    // tenant points at it.
    let event = events
        .create_event(
            tenant,
            CreateEventRequest {
                name: "Launch".into(),
                description: None,
                start_date: "2024-11-12".into(),
                end_date: "2024-11-13".into(),
                quote_id: Some(quote.id),
                status: None,
            },
        )
        .await
        .unwrap();
    event_inventory::ActiveModel {
        tenant_id: Set(Uuid::new_v4()),
        event_id: Set(event.id),
        item_id: Set(lights.id),
        quantity: Set(1),
        unit_price_snapshot: Set(dec!(1.00)),
        ..Default::default()
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let outcome = quotes.confirm_quotation(tenant, quote.id).await.unwrap();
    assert_eq!(outcome.event_id, Some(event.id));

    let detail = events.get_event(tenant, event.id).await.unwrap();
    assert_eq!(detail.inventory.len(), 1);
    assert_eq!(detail.inventory[0].quantity, 6);
}
