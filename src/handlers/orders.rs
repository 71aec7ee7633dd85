use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::{AdminUser, AuthenticatedCustomer},
    entities::order::{OrderStatus, PaymentStatus},
    errors::ServiceError,
    services::orders::{ConfirmPaymentInput, OrderListQuery, PlaceOrderInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for customer order endpoints
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/checkout/intent", post(create_payment_intent))
        .route("/checkout/confirm", post(confirm_payment))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

/// Creates the router for admin order endpoints
pub fn admin_order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id/status", put(update_order_status))
        .route("/:id", delete(delete_order))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    order_status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
}

/// Place a cash-on-delivery order from the cart
async fn place_order(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Json(payload): Json<PlaceOrderInput>,
) -> Result<Response, ServiceError> {
    let order = state.services.order.place_order(customer_id, payload).await?;
    Ok(created_response(order))
}

/// Create a gateway order for online payment of the current cart
async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
) -> Result<Response, ServiceError> {
    let intent = state
        .services
        .order
        .create_payment_intent(customer_id)
        .await?;
    Ok(success_response(intent))
}

/// Verify the gateway signature and place the paid order
async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Json(payload): Json<ConfirmPaymentInput>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .order
        .confirm_payment(customer_id, payload)
        .await?;
    Ok(created_response(order))
}

/// List the customer's orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let page = state.services.order.list_orders(customer_id, query).await?;
    Ok(success_response(page))
}

/// Get one of the customer's orders
async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.order.get_order(customer_id, id).await?;
    Ok(success_response(order))
}

/// Cancel an order, restoring stock and refunding online payments
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.order.cancel_order(customer_id, id).await?;
    Ok(success_response(order))
}

/// Admin: list all orders
async fn admin_list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let page = state.services.order.list_all_orders(query).await?;
    Ok(success_response(page))
}

/// Admin: transition an order's status
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .order
        .update_order_status(id, payload.order_status, payload.payment_status)
        .await?;
    Ok(success_response(order))
}

/// Admin: delete a finished order
async fn delete_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.order.delete_order(id).await?;
    Ok(no_content_response())
}
