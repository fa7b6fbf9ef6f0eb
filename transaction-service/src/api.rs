use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use inventory_service::StockService;
use payment_service::CardService;
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::error;
use uuid::Uuid;
use crate::lifecycle::TransactionLifecycle;

const GENERIC_ERROR: &str = "An unexpected error has occurred, contact the administrator.";

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<TransactionLifecycle>,
    pub stock: StockService,
    pub cards: CardService,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DecreaseStockRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveCardRequest {
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_type: String,
}

#[derive(Debug, Serialize)]
pub struct CardOnFileResponse {
    pub customer_id: Uuid,
    pub card: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub result: Reconciliation,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Maps the error taxonomy onto HTTP. Internal failures are logged in full
/// and answered with a generic message.
#[derive(Debug)]
pub struct ApiError(pub CheckoutError);

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(CheckoutError::BadPayload(rejection.body_text()))
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CheckoutError::Validation(_) | CheckoutError::BadPayload(_) => StatusCode::BAD_REQUEST,
            CheckoutError::NotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::InsufficientStock(_) => StatusCode::CONFLICT,
            CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
            err if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!("Request failed: {}", self.0);
            match self.0 {
                CheckoutError::Gateway(_) => {
                    "Payment could not be completed; query the transaction status before retrying"
                        .to_string()
                }
                _ => GENERIC_ERROR.to_string(),
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            status: status.as_u16(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

pub fn create_router(state: AppState, allow_origin: AllowOrigin) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id/stock/decrease", post(decrease_stock))
        .route("/transactions", post(create_transaction))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/pay", post(pay_transaction))
        .route("/transactions/:id/delivery", get(get_delivery))
        .route("/webhooks/payments", post(payment_webhook))
        .route("/customers", post(create_customer))
        .route("/customers/:id/card", get(get_card).put(save_card))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.stock.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(request) = payload?;
    let product = state.stock.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn decrease_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecreaseStockRequest>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.stock.decrease_stock(id, request.quantity).await?))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(request) = payload?;
    let tx = state.lifecycle.create(request.product_id).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.lifecycle.get(id).await?))
}

pub async fn pay_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PaymentInfo>, JsonRejection>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    let Json(payment) = payload?;
    Ok(Json(state.lifecycle.pay(id, payment).await?))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, ApiError> {
    state
        .lifecycle
        .delivery(id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError(CheckoutError::NotFound(format!(
                "Transaction {} has no delivery",
                id
            )))
        })
}

/// Takes the raw body so malformed JSON is reported as a bad payload rather
/// than an extractor rejection.
pub async fn payment_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| CheckoutError::BadPayload(e.to_string()))?;
    let result = state.lifecycle.reconcile(&event).await?;
    Ok(Json(WebhookResponse { result }))
}

pub async fn create_customer(
    State(state): State<AppState>,
    payload: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let Json(request) = payload?;
    let customer = state
        .cards
        .create_customer(&request.name, &request.email)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn save_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SaveCardRequest>, JsonRejection>,
) -> Result<Json<CardOnFileResponse>, ApiError> {
    let Json(request) = payload?;
    state
        .cards
        .save_card(id, &request.card_number, &request.card_type)
        .await?;
    let card = state.cards.card_on_file(id).await?;
    Ok(Json(CardOnFileResponse {
        customer_id: id,
        card,
    }))
}

pub async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CardOnFileResponse>, ApiError> {
    let card = state.cards.card_on_file(id).await?;
    Ok(Json(CardOnFileResponse {
        customer_id: id,
        card,
    }))
}
