//! Cart behaviour: line accumulation, stock limits, quantity updates,
//! and identity enforcement.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

fn decimal_field(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.as_f64().expect("decimal number"),
        other => panic!("unexpected decimal encoding: {:?}", other),
    }
}

#[tokio::test]
async fn cart_requires_customer_identity() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/cart", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/cart",
            None,
            &[("x-customer-id", "not-a-uuid")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn adding_same_product_accumulates_quantity() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let product = app.seed_product("Paracetamol 500mg", dec!(30.00), 10).await;

    let payload = json!({ "product_id": product.id, "quantity": 2 });
    let response = app
        .request_as(customer, Method::POST, "/api/v1/cart/items", Some(payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as(customer, Method::POST, "/api/v1/cart/items", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 4);
    assert_eq!(body["total_items"], 4);
    assert_eq!(decimal_field(&body["subtotal"]), 120.0);
}

#[tokio::test]
async fn cart_rejects_quantities_beyond_stock() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let product = app.seed_product("Insulin Pen", dec!(450.00), 3).await;

    let response = app
        .request_as(
            customer,
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 5 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Accumulation across calls is also capped
    for expected in [StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY] {
        let response = app
            .request_as(
                customer,
                Method::POST,
                "/api/v1/cart/items",
                Some(json!({ "product_id": product.id, "quantity": 2 })),
            )
            .await;
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn unknown_product_returns_not_found() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();

    let response = app
        .request_as(
            customer,
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quantity_update_requires_at_least_one() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let product = app.seed_product("Vitamin D3", dec!(120.00), 20).await;

    app.request_as(
        customer,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;

    let uri = format!("/api/v1/cart/items/{}", product.id);
    let response = app
        .request_as(customer, Method::PUT, &uri, Some(json!({ "quantity": 5 })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["items"][0]["quantity"], 5);

    // Zero is rejected; removal goes through DELETE
    let response = app
        .request_as(customer, Method::PUT, &uri, Some(json!({ "quantity": 0 })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.request_as(customer, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn removing_a_product_not_in_cart_fails() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let product = app.seed_product("Cough Syrup", dec!(85.00), 5).await;

    let response = app
        .request_as(
            customer,
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", product.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clearing_the_cart_empties_it() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let product = app.seed_product("Band-Aid Pack", dec!(40.00), 50).await;

    app.request_as(
        customer,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 3 })),
    )
    .await;

    let response = app.request_as(customer, Method::DELETE, "/api/v1/cart", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request_as(customer, Method::GET, "/api/v1/cart", None).await;
    let body = response_json(response).await;
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["total_items"], 0);
}

#[tokio::test]
async fn carts_are_isolated_per_customer() {
    let app = TestApp::new().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let product = app.seed_product("Thermometer", dec!(199.00), 10).await;

    app.request_as(
        alice,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    let response = app.request_as(bob, Method::GET, "/api/v1/cart", None).await;
    let body = response_json(response).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}
