use crate::handlers::common::{no_content_response, success_response, validate_input};
use crate::{auth::AuthenticatedCustomer, errors::ServiceError, AppState};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_item))
        .route("/items/:product_id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
struct AddItemRequest {
    product_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateItemRequest {
    #[validate(range(min = 1, max = 100))]
    quantity: i32,
}

/// Get the current customer's cart
async fn get_cart(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.get_cart(customer_id).await?;
    Ok(success_response(cart))
}

/// Add a product to the cart
async fn add_item(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Json(payload): Json<AddItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .cart
        .add_item(customer_id, payload.product_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Set the quantity of a cart line
async fn update_item(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .cart
        .update_item_quantity(customer_id, product_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Remove a product from the cart
async fn remove_item(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(customer_id, product_id)
        .await?;
    Ok(success_response(cart))
}

/// Empty the cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
) -> Result<Response, ServiceError> {
    state.services.cart.clear_cart(customer_id).await?;
    Ok(no_content_response())
}
