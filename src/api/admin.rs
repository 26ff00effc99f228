//! Operator endpoints: order management and the stats dashboard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::{validation, ApiError, ApiJson, ApiQuery, AppState, PaginatedResponse};
use crate::domain::aggregates::{Customer, LineItem, Order, OrderPatch, OrderStatus};
use crate::domain::value_objects::Weight;
use crate::ledger::NewOrder;
use crate::stats::{Period, Stats};
use crate::storage::{products_by_id, OrderFilter, Page};
use crate::BackofficeError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub seller: Option<String>,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse::<OrderStatus>().map_err(|e| ApiError::new("validation_error", e.to_string()))
}

pub(super) async fn list_orders(
    State(s): State<AppState>,
    ApiQuery(p): ApiQuery<ListParams>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let filter = OrderFilter {
        status: p.status.as_deref().filter(|v| !v.is_empty()).map(parse_status).transpose()?,
        seller: p.seller.filter(|v| !v.is_empty()),
    };
    let page = Page::new(p.page, p.per_page);
    let (data, total) = s.ledger.list_orders(&filter, page).await?;
    Ok(Json(PaginatedResponse { data, total, page: page.page }))
}

pub(super) async fn get_order(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.ledger.get_order(&id).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderRequest {
    #[validate(length(min = 1, message = "customer name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "customer phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub province: Option<String>,
    #[validate(length(min = 1, message = "order has no line items"))]
    pub items: Vec<LineItem>,
    /// Computed from the catalog weights when omitted.
    pub shipping: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub extra_cost: Option<Decimal>,
    pub payment_method: Option<String>,
    pub seller: Option<String>,
    pub note: Option<String>,
}

pub(super) async fn create_order(
    State(s): State<AppState>,
    ApiJson(r): ApiJson<AdminOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    r.validate().map_err(validation)?;
    let destination = r
        .province
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(s.shipping.home_province.as_str())
        .to_string();

    let shipping = match r.shipping {
        Some(fee) => fee,
        None => {
            let ids: Vec<String> = r.items.iter().filter_map(|l| l.id.clone()).collect();
            let products = products_by_id(s.catalog.as_ref(), &ids).await.map_err(BackofficeError::from)?;
            let weight: Weight = r
                .items
                .iter()
                .filter_map(|l| products.get(l.id.as_deref()?).map(|p| p.weight.times(l.qty)))
                .sum();
            s.shipping.compute_shipping(weight, &destination)
        }
    };

    let order = s
        .ledger
        .create_order(NewOrder {
            customer: Customer { name: r.name, phone: r.phone, address: r.address, province: Some(destination) },
            lines: r.items,
            payment_method: r.payment_method.unwrap_or_else(|| "cod".to_string()),
            seller: r.seller,
            shipping,
            discount: r.discount.unwrap_or(Decimal::ZERO),
            extra_cost: r.extra_cost.unwrap_or(Decimal::ZERO),
            note: r.note,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub(super) async fn update_order(
    State(s): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<OrderPatch>,
) -> Result<StatusCode, ApiError> {
    s.ledger.update_order(&id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn delete_order(State(s): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    s.ledger.delete_order(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn mark_paid(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.ledger.set_paid(&id, true).await?))
}

pub(super) async fn mark_unpaid(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.ledger.set_paid(&id, false).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub(super) async fn set_status(
    State(s): State<AppState>,
    Path(id): Path<String>,
    ApiJson(r): ApiJson<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let status = parse_status(&r.status)?;
    Ok(Json(s.ledger.set_status(&id, status).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub period: Option<String>,
}

pub(super) async fn stats(State(s): State<AppState>, ApiQuery(p): ApiQuery<StatsParams>) -> Result<Json<Stats>, ApiError> {
    let period = match p.period.as_deref() {
        None | Some("") => Period::default(),
        Some(raw) => raw.parse::<Period>()?,
    };
    Ok(Json(s.stats.aggregate(period, Utc::now()).await?))
}
