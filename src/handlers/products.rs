use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AdminUser,
    errors::ServiceError,
    services::products::{CreateProductInput, ProductListQuery, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for public catalog endpoints
pub fn product_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Creates the router for admin catalog endpoints
pub fn admin_product_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
}

/// List products with optional filters
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ServiceError> {
    let page = state.services.product.list_products(query).await?;
    Ok(success_response(page))
}

/// Get a single product
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let product = state.services.product.get_product(id).await?;
    Ok(success_response(product))
}

/// Admin: add a product to the catalog
async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.product.create_product(payload).await?;
    Ok(created_response(product))
}

/// Admin: update a product
async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.product.update_product(id, payload).await?;
    Ok(success_response(product))
}

/// Admin: remove a product
async fn delete_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.product.delete_product(id).await?;
    Ok(no_content_response())
}
