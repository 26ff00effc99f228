//! Storefront endpoints: checkout, order lookup, shipping quotes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{validation, ApiError, ApiJson, AppState};
use crate::domain::aggregates::{Cart, CartError, CartItem, Customer, Order, PricedCart};
use crate::domain::shipping::{ShippingQuote, PROVINCES};
use crate::ledger::NewOrder;
use crate::storage::products_by_id;
use crate::BackofficeError;

fn default_payment_method() -> String { "cod".to_string() }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "customer name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "customer phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub province: Option<String>,
    #[validate(length(min = 1, message = "cart is empty"))]
    pub items: Vec<CartItem>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub id: String,
    pub invoice_url: String,
}

async fn price_cart(state: &AppState, cart: &Cart) -> Result<PricedCart, ApiError> {
    cart.validate().map_err(validation)?;
    for item in &cart.items {
        item.validate().map_err(validation)?;
    }
    let products = products_by_id(state.catalog.as_ref(), &cart.product_ids())
        .await
        .map_err(BackofficeError::from)?;
    cart.price(&products, &state.shipping).map_err(|e| {
        let e = match e {
            CartError::UnknownProduct(id) => BackofficeError::ProductNotFound(id),
            other => BackofficeError::Validation(other.to_string()),
        };
        ApiError::from(e)
    })
}

pub(super) async fn checkout(
    State(state): State<AppState>,
    ApiJson(r): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    r.validate().map_err(validation)?;
    let cart = Cart { province: r.province.clone(), items: r.items };
    let priced = price_cart(&state, &cart).await?;
    if !priced.quote.is_deliverable() {
        return Err(ApiError::new(
            "validation_error",
            format!("cannot ship to {}: {}", priced.quote.province, priced.quote.unshippable.join(", ")),
        ));
    }
    let discount = priced
        .check_discount(r.discount.unwrap_or(Decimal::ZERO))
        .map_err(|e| ApiError::new("validation_error", e.to_string()))?;

    let order = state
        .ledger
        .create_order(NewOrder {
            customer: Customer {
                name: r.name.trim().to_string(),
                phone: r.phone.trim().to_string(),
                address: r.address,
                province: Some(priced.quote.province.clone()),
            },
            lines: priced.lines,
            payment_method: r.payment_method,
            seller: None,
            shipping: priced.quote.fee,
            discount,
            extra_cost: Decimal::ZERO,
            note: r.note,
        })
        .await?;

    let invoice_url = format!("{}/{}", state.invoice_base_url, order.id);
    Ok((StatusCode::CREATED, Json(CheckoutResponse { id: order.id, invoice_url })))
}

pub(super) async fn quote_shipping(
    State(state): State<AppState>,
    ApiJson(cart): ApiJson<Cart>,
) -> Result<Json<ShippingQuote>, ApiError> {
    Ok(Json(price_cart(&state, &cart).await?.quote))
}

pub(super) async fn lookup_orders(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.ledger.lookup_by_phone(&phone).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceList {
    pub home_province: String,
    pub provinces: Vec<&'static str>,
}

pub(super) async fn list_provinces(State(state): State<AppState>) -> Json<ProvinceList> {
    Json(ProvinceList { home_province: state.shipping.home_province.clone(), provinces: PROVINCES.to_vec() })
}
