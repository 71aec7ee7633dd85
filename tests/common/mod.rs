use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use quickmeds_api::{
    config::AppConfig,
    db,
    entities::product,
    errors::ServiceError,
    events::create_event_channel,
    services::payments::{GatewayOrder, GatewayRefund, PaymentGateway},
    AppState,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Signature accepted by the test gateway.
pub const VALID_SIGNATURE: &str = "sig-valid";
/// Payment id for which the test gateway's refund endpoint is down.
pub const REFUND_DOWN_PAYMENT_ID: &str = "pay_gateway_down";

/// Deterministic in-process stand-in for the payment gateway.
pub struct TestGateway;

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        _receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let paise = (amount * Decimal::from(100)).round().to_i64().unwrap();
        Ok(GatewayOrder {
            id: format!("order_test_{}", Uuid::new_v4().simple()),
            amount: paise,
            currency: currency.to_string(),
        })
    }

    fn verify_payment_signature(
        &self,
        _gateway_order_id: &str,
        _payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        if signature == VALID_SIGNATURE {
            Ok(())
        } else {
            Err(ServiceError::PaymentVerificationFailed(
                "signature mismatch".to_string(),
            ))
        }
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        _amount: Decimal,
    ) -> Result<GatewayRefund, ServiceError> {
        if payment_id == REFUND_DOWN_PAYMENT_ID {
            return Err(ServiceError::GatewayError("refund endpoint down".into()));
        }
        Ok(GatewayRefund {
            id: format!("rfnd_test_{}", Uuid::new_v4().simple()),
            status: "processed".to_string(),
        })
    }
}

/// Test application over a throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("quickmeds_test.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let config = AppConfig {
            database_url: db_url.clone(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            host: "127.0.0.1".to_string(),
            port: 18080,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            db_idle_timeout_secs: 60,
            delivery_fee: Decimal::from(50),
            currency: "INR".to_string(),
            admin_token: Some(ADMIN_TOKEN.to_string()),
            razorpay_key_id: Some("rzp_test_key".to_string()),
            razorpay_key_secret: None,
            gateway_timeout_secs: 5,
        };

        let pool = db::establish_connection(&db_url)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        // Receiver dropped: events are best-effort and tests do not consume them
        let (event_sender, _event_rx) = create_event_channel(256);

        let state = Arc::new(AppState::new(
            db_arc,
            Arc::new(config),
            Arc::new(event_sender),
            Arc::new(TestGateway),
        ));
        let router = quickmeds_api::app_router(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
        }
    }

    /// Inserts a catalog product directly.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            code: Set(None),
            description: Set(None),
            category: Set(Some("General".to_string())),
            price: Set(price),
            original_price: Set(None),
            stock_quantity: Set(stock),
            in_stock: Set(stock > 0),
            expiry_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed product")
    }

    /// Request without identity headers.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    /// Request as a customer.
    pub async fn request_as(
        &self,
        customer_id: Uuid,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let id = customer_id.to_string();
        self.request_with_headers(method, uri, body, &[("x-customer-id", id.as_str())])
            .await
    }

    /// Request as an admin.
    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request_with_headers(method, uri, body, &[("x-admin-token", ADMIN_TOKEN)])
            .await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
