use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AuthenticatedCustomer, errors::ServiceError,
    services::addresses::CreateAddressInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for address book endpoints
pub fn address_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/:id/default", post(set_default_address))
        .route("/:id", delete(delete_address))
}

/// List the customer's saved addresses
async fn list_addresses(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
) -> Result<Response, ServiceError> {
    let addresses = state.services.address.list_addresses(customer_id).await?;
    Ok(success_response(addresses))
}

/// Save a new address
async fn create_address(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Json(payload): Json<CreateAddressInput>,
) -> Result<Response, ServiceError> {
    let address = state
        .services
        .address
        .create_address(customer_id, payload)
        .await?;
    Ok(created_response(address))
}

/// Make an address the default delivery address
async fn set_default_address(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let address = state
        .services
        .address
        .set_default_address(customer_id, id)
        .await?;
    Ok(success_response(address))
}

/// Delete a saved address
async fn delete_address(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .services
        .address
        .delete_address(customer_id, id)
        .await?;
    Ok(no_content_response())
}
