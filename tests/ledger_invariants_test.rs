mod common;

use std::sync::Arc;

use common::TestApp;
use gearhouse_api::entities::ledger_audit::{self, LedgerAction};
use gearhouse_api::services::inventory::AvailabilityWindow;
use gearhouse_api::services::quotes::{AddQuoteItemRequest, CreateQuoteRequest, QuantityInput};
use rstest::rstest;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

async fn ledger_totals(app: &TestApp, items: &[Uuid]) -> Vec<i64> {
    let mut totals = Vec::with_capacity(items.len());
    for id in items {
        let breakdown = app
            .services()
            .inventory
            .availability(&app.tenant, *id, AvailabilityWindow::default())
            .await
            .unwrap();
        totals.push(breakdown.total - breakdown.in_transit);
    }
    totals
}

async fn quote_with_lines(app: &TestApp, start: &str, end: &str, lines: &[(Uuid, i64)]) -> Uuid {
    let quotes = &app.services().quotes;
    let quote = quotes
        .create_quote(
            &app.tenant,
            CreateQuoteRequest {
                name: "Invariant".into(),
                customer_name: None,
                start_date: start.into(),
                end_date: end.into(),
                notes: None,
            },
        )
        .await
        .unwrap();
    for (item_id, quantity) in lines {
        quotes
            .add_quote_item(
                &app.tenant,
                quote.id,
                AddQuoteItemRequest {
                    item_id: *item_id,
                    quantity: QuantityInput::from(*quantity),
                    unit_price: None,
                },
            )
            .await
            .unwrap();
    }
    quote.id
}

/// Confirm takes out exactly the confirmed quantities and delete puts back
/// exactly the same, across bulk and serialized items and repeated lines.
#[rstest]
#[case::single_bulk(vec![(0, 4)])]
#[case::repeated_bulk_lines(vec![(0, 2), (0, 3)])]
#[case::mixed(vec![(0, 5), (1, 2), (2, 1)])]
#[case::serialized_only(vec![(1, 3)])]
#[tokio::test]
async fn confirm_and_delete_move_equal_quantities(#[case] lines: Vec<(usize, i64)>) {
    let app = TestApp::new().await;
    let items = vec![
        app.bulk_item("Chair", 20, 2).await.id,
        app.serialized_item("Projector", 4).await.id,
        app.bulk_item("Tablecloth", 8, 0).await.id,
    ];
    let lines: Vec<(Uuid, i64)> = lines.into_iter().map(|(i, q)| (items[i], q)).collect();
    let requested: i64 = lines.iter().map(|(_, q)| q).sum();

    let quote_id = quote_with_lines(&app, "2024-03-01", "2024-03-03", &lines).await;
    let before = ledger_totals(&app, &items).await;

    let outcome = app
        .services()
        .quotes
        .confirm_quotation(&app.tenant, quote_id)
        .await
        .unwrap();
    assert!(outcome.shortfalls.is_empty());

    let during = ledger_totals(&app, &items).await;
    let consumed: i64 = before.iter().zip(&during).map(|(b, d)| b - d).sum();
    assert_eq!(consumed, requested);

    app.services()
        .quotes
        .delete_quote(&app.tenant, quote_id)
        .await
        .unwrap();
    let after = ledger_totals(&app, &items).await;
    assert_eq!(after, before);

    // Every ledger movement left an audit row.
    let audits = ledger_audit::Entity::find()
        .filter(ledger_audit::Column::QuoteId.eq(quote_id))
        .all(&*app.state.db)
        .await
        .unwrap();
    let consumed_audited: i64 = audits
        .iter()
        .filter(|a| a.action == LedgerAction::Consume)
        .map(|a| i64::from(a.applied))
        .sum();
    let released_audited: i64 = audits
        .iter()
        .filter(|a| a.action == LedgerAction::Release)
        .map(|a| i64::from(a.applied))
        .sum();
    assert_eq!(consumed_audited, requested);
    assert_eq!(released_audited, requested);
}

/// Concurrent confirmations never take more than the ledger holds. The
/// quotes sit in separate weeks so only the ledger, not soft holds, limits them.
#[tokio::test]
async fn concurrent_confirmations_do_not_oversell() {
    let app = Arc::new(TestApp::new().await);
    let item = app.bulk_item("Heater", 6, 0).await;

    let mut quote_ids = Vec::new();
    for week in 0..4 {
        let start = format!("2024-02-{:02}", 1 + week * 7);
        let end = format!("2024-02-{:02}", 3 + week * 7);
        quote_ids.push(quote_with_lines(&app, &start, &end, &[(item.id, 2)]).await);
    }

    let mut tasks = Vec::new();
    for quote_id in quote_ids {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            app.services()
                .quotes
                .confirm_quotation(&app.tenant, quote_id)
                .await
                .is_ok()
        }));
    }

    let mut confirmed = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            confirmed += 1;
        }
    }

    let breakdown = app
        .services()
        .inventory
        .availability(&app.tenant, item.id, AvailabilityWindow::default())
        .await
        .unwrap();
    assert_eq!(confirmed, 3);
    assert_eq!(breakdown.total, 0);
}
