//! HTTP surface.

mod admin;
mod orders;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::ValidationErrors;

use crate::domain::shipping::ShippingRates;
use crate::ledger::OrderLedger;
use crate::stats::StatsAggregator;
use crate::storage::ProductCatalog;
use crate::BackofficeError;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<OrderLedger>,
    pub stats: Arc<StatsAggregator>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub shipping: Arc<ShippingRates>,
    pub invoice_base_url: Arc<str>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: ErrorBody { code: code.into(), message: message.into() } }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<BackofficeError> for ApiError {
    fn from(e: BackofficeError) -> Self {
        match e {
            BackofficeError::Validation(msg) => ApiError::new("validation_error", msg),
            e @ (BackofficeError::OrderNotFound(_) | BackofficeError::ProductNotFound(_)) => {
                ApiError::new("not_found", e.to_string())
            }
            BackofficeError::Storage(e) => {
                tracing::error!(error = %e, "storage operation failed");
                ApiError::new("internal_error", "storage failure")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new("validation_error", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new("validation_error", rejection.body_text())
    }
}

/// `Json` whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub(crate) fn validation(errors: ValidationErrors) -> ApiError {
    ApiError::new("validation_error", errors.to_string())
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-backoffice"})) }))
        .route("/api/v1/provinces", get(orders::list_provinces))
        .route("/api/v1/shipping/quote", post(orders::quote_shipping))
        .route("/api/v1/orders", post(orders::checkout))
        .route("/api/v1/orders/lookup/:phone", get(orders::lookup_orders))
        .route("/api/v1/admin/orders", get(admin::list_orders).post(admin::create_order))
        .route(
            "/api/v1/admin/orders/:id",
            get(admin::get_order).patch(admin::update_order).delete(admin::delete_order),
        )
        .route("/api/v1/admin/orders/:id/paid", post(admin::mark_paid))
        .route("/api/v1/admin/orders/:id/unpaid", post(admin::mark_unpaid))
        .route("/api/v1/admin/orders/:id/status", put(admin::set_status))
        .route("/api/v1/admin/stats", get(admin::stats))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
