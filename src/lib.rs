pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::AppConfig;
use events::EventSender;
use services::payments::PaymentGateway;

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub cart: services::CartService,
    pub order: services::OrderService,
    pub product: services::ProductCatalogService,
    pub address: services::AddressService,
}

/// Shared application state injected into every handler.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    /// Wires up the full service graph over a database connection and a
    /// payment gateway implementation.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let inventory = services::InventoryService::new();
        let services = AppServices {
            cart: services::CartService::new(db.clone(), event_sender.clone()),
            order: services::OrderService::new(
                db.clone(),
                inventory,
                gateway,
                event_sender.clone(),
                config.clone(),
            ),
            product: services::ProductCatalogService::new(db.clone()),
            address: services::AddressService::new(db.clone()),
        };

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Standard API envelope used by the status endpoints.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Builds the full application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .nest("/orders", handlers::orders::admin_order_routes())
        .nest("/products", handlers::products::admin_product_routes());

    let api_v1 = Router::new()
        .nest("/products", handlers::products::product_routes())
        .nest("/cart", handlers::carts::cart_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/addresses", handlers::addresses::address_routes())
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let parsed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse::<axum::http::HeaderValue>().ok())
                .collect::<Vec<_>>();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
    .max_age(Duration::from_secs(3600))
}

/// Liveness probe
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(json!({ "status": "ok" })))
}

/// Readiness probe; checks the database connection
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match db::check_connection(&state.db).await {
        Ok(()) => Json(ApiResponse::success(json!({
            "status": "ok",
            "database": "connected",
            "environment": state.config.environment,
        })))
        .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<serde_json::Value>::error(
                    "database unavailable".to_string(),
                )),
            )
                .into_response()
        }
    }
}
