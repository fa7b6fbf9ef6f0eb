use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use inventory_service::StockService;
use payment_service::{CardService, EncryptionService};
use serde_json::{json, Value};
use shared::memory::*;
use shared::*;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::cors::AllowOrigin;
use transaction_service::api::{create_router, AppState};
use transaction_service::TransactionLifecycle;
use uuid::Uuid;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const IV: &str = "a0a1a2a3a4a5a6a7a8a9aaabacadaeaf";

struct TestApp {
    router: Router,
    products: Arc<InMemoryProductRepository>,
    product: Product,
}

fn test_app(gateway: StubGateway) -> TestApp {
    let product = Product::new("Lamp".into(), "Desk lamp".into(), BigDecimal::from(25), 5);
    let products = Arc::new(InMemoryProductRepository::with_products([product.clone()]));
    let stock = StockService::new(products.clone());

    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let deliveries = Arc::new(InMemoryDeliveryRepository::new());
    let settlements = Arc::new(InMemorySettlementStore::new(
        transactions.clone(),
        products.clone(),
        deliveries.clone(),
    ));

    let lifecycle = TransactionLifecycle::new(
        transactions,
        settlements,
        stock.clone(),
        deliveries,
        Arc::new(gateway),
    );
    let cards = CardService::new(
        Arc::new(InMemoryCustomerRepository::new()),
        Arc::new(EncryptionService::from_hex(KEY, IV).unwrap()),
    );

    let state = AppState {
        lifecycle: Arc::new(lifecycle),
        stock,
        cards,
    };
    let origin = AllowOrigin::exact("http://localhost:5173".parse().unwrap());

    TestApp {
        router: create_router(state, origin),
        products,
        product,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create_transaction(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/transactions",
                Some(json!({ "product_id": self.product.id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

fn payment(card_number: &str) -> Value {
    json!({
        "card_number": card_number,
        "card_type": "VISA",
        "customer_address": "Main St 1",
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_products_create_and_list() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));

    let (status, created) = app
        .send(
            Method::POST,
            "/products",
            Some(json!({ "name": "Chair", "description": "Oak", "price": "80.50", "stock": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Chair");

    let (status, list) = app.send(Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(Method::POST, "/products", Some(json!({ "name": "Broken" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_decrease_stock_route() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let uri = format!("/products/{}/stock/decrease", app.product.id);

    let (status, product) = app.send(Method::POST, &uri, Some(json!({ "quantity": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 3);

    let (status, body) = app.send(Method::POST, &uri, Some(json!({ "quantity": 4 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Insufficient stock. Available: 3, requested: 4");
    assert_eq!(app.products.stock_of(app.product.id), Some(3));
}

#[tokio::test]
async fn test_create_transaction_for_unknown_product() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let missing = Uuid::new_v4();

    let (status, body) = app
        .send(Method::POST, "/transactions", Some(json!({ "product_id": missing })))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Product with ID {} not found", missing));
}

#[tokio::test]
async fn test_pay_and_read_back() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let id = app.create_transaction().await;

    let (status, outcome) = app
        .send(
            Method::POST,
            &format!("/transactions/{}/pay", id),
            Some(payment("4111111111111111")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "APPROVED");
    assert_eq!(outcome["gateway_transaction_id"], "gw-1");

    let (status, tx) = app.send(Method::GET, &format!("/transactions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["status"], "APPROVED");
    assert_eq!(tx["delivery_address"], "Main St 1");
    assert_eq!(app.products.stock_of(app.product.id), Some(4));
}

#[tokio::test]
async fn test_delivery_route() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let id = app.create_transaction().await;

    let (status, body) = app
        .send(Method::GET, &format!("/transactions/{}/delivery", id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Transaction {} has no delivery", id));

    app.send(
        Method::POST,
        &format!("/transactions/{}/pay", id),
        Some(payment("4111111111111111")),
    )
    .await;

    let (status, delivery) = app
        .send(Method::GET, &format!("/transactions/{}/delivery", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["transaction_id"], id);
    assert_eq!(delivery["address"], "Main St 1");
    assert_eq!(delivery["status"], "PENDING");
}

async fn send_raw(app: &TestApp, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_malformed_bodies_get_error_json() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let id = app.create_transaction().await;

    let (status, body) = send_raw(&app, "/transactions", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid payload"));

    let (status, body) = send_raw(&app, "/transactions", r#"{"product_id":"nope"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = send_raw(&app, &format!("/transactions/{}/pay", id), "[1, 2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(app.products.stock_of(app.product.id), Some(5));
}

#[tokio::test]
async fn test_invalid_card_is_bad_request() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));
    let id = app.create_transaction().await;

    let (status, body) = app
        .send(Method::POST, &format!("/transactions/{}/pay", id), Some(payment("1234")))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Card number must be 16 digits");
    assert_eq!(app.products.stock_of(app.product.id), Some(5));
}

#[tokio::test]
async fn test_gateway_failure_is_bad_gateway() {
    let app = test_app(StubGateway::failing("upstream 503"));
    let id = app.create_transaction().await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/transactions/{}/pay", id),
            Some(payment("4111111111111111")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["error"].as_str().unwrap().contains("upstream"));
}

#[tokio::test]
async fn test_webhook_roundtrip() {
    let app = test_app(StubGateway::new(TransactionStatus::Pending, "gw-42"));
    let id = app.create_transaction().await;
    app.send(
        Method::POST,
        &format!("/transactions/{}/pay", id),
        Some(payment("4111111111111111")),
    )
    .await;

    let event = json!({ "data": { "id": "gw-42", "status": "APPROVED" } });
    let (status, first) = app
        .send(Method::POST, "/webhooks/payments", Some(event.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["result"], "applied");

    let (status, second) = app.send(Method::POST, "/webhooks/payments", Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["result"], "duplicate");
    assert_eq!(app.products.stock_of(app.product.id), Some(4));
}

#[tokio::test]
async fn test_webhook_rejects_bad_payloads() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/webhooks/payments", Some(json!({ "data": { "id": "gw-1" } })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/webhooks/payments",
            Some(json!({ "data": { "id": "gw-unknown", "status": "APPROVED" } })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_card_on_file() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));

    let (status, customer) = app
        .send(
            Method::POST,
            "/customers",
            Some(json!({ "name": "Ana", "email": "ana@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = customer["id"].as_str().unwrap().to_string();
    assert_eq!(customer["saved_card"], Value::Null);

    let (status, rejected) = app
        .send(
            Method::PUT,
            &format!("/customers/{}/card", id),
            Some(json!({ "card_number": "4111111111111111", "card_type": "AMEX" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected["error"], "Only VISA and MASTERCARD are allowed");

    let (status, saved) = app
        .send(
            Method::PUT,
            &format!("/customers/{}/card", id),
            Some(json!({ "card_number": "5500000000000004", "card_type": "MASTERCARD" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["card"], "************0004");

    let (status, on_file) = app.send(Method::GET, &format!("/customers/{}/card", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on_file["card"], "************0004");
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let app = test_app(StubGateway::new(TransactionStatus::Approved, "gw-1"));

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}
