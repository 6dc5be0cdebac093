#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use gearhouse_api::{
    auth::{AuthConfig, AuthService, TenantContext, ADMIN_ROLE},
    config::AppConfig,
    db::{self, DbConfig},
    entities::inventory_item,
    events::{self, EventSender},
    handlers::AppServices,
    services::inventory::{CreateItemRequest, SetStockRequest},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application harness backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub tenant: TenantContext,
    pub admin_token: String,
    pub viewer_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        // One connection: every in-memory SQLite connection is its own database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg);

        let tenant = TenantContext::new(Uuid::new_v4(), "test-admin");
        let admin_token = auth_service
            .issue_token("test-admin", tenant.tenant_id, vec![ADMIN_ROLE.to_string()])
            .expect("admin token");
        let viewer_token = auth_service
            .issue_token("test-viewer", tenant.tenant_id, vec!["viewer".to_string()])
            .expect("viewer token");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            auth: auth_service,
        };

        Self {
            router: gearhouse_api::build_router(state.clone()),
            state,
            tenant,
            admin_token,
            viewer_token,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Issues an admin token for a different tenant.
    pub fn token_for_tenant(&self, tenant_id: Uuid) -> String {
        self.state
            .auth
            .issue_token("other-admin", tenant_id, vec![ADMIN_ROLE.to_string()])
            .expect("tenant token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(&self.admin_token), None)
            .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(&self.admin_token), None)
            .await
    }

    /// Bulk item with the given stock counters.
    pub async fn bulk_item(&self, name: &str, total: i32, out_of_service: i32) -> inventory_item::Model {
        let inventory = &self.services().inventory;
        let item = inventory
            .create_item(
                &self.tenant,
                CreateItemRequest {
                    name: name.to_string(),
                    description: None,
                    is_serialized: false,
                    price: Decimal::new(1250, 2),
                    initial_quantity: Some(total),
                },
            )
            .await
            .expect("create bulk item");
        if out_of_service > 0 {
            inventory
                .set_stock(
                    &self.tenant,
                    item.id,
                    SetStockRequest {
                        total_quantity: total,
                        out_of_service_quantity: out_of_service,
                    },
                )
                .await
                .expect("set stock");
        }
        item
    }

    /// Serialized item with `units` available units.
    pub async fn serialized_item(&self, name: &str, units: i32) -> inventory_item::Model {
        self.services()
            .inventory
            .create_item(
                &self.tenant,
                CreateItemRequest {
                    name: name.to_string(),
                    description: None,
                    is_serialized: true,
                    price: Decimal::new(9900, 2),
                    initial_quantity: Some(units),
                },
            )
            .await
            .expect("create serialized item")
    }
}
