//! Storage ports and their implementations.
//!
//! The ledger and the stats aggregator only see [`OrderStore`] and
//! [`ProductCatalog`]. The process entry point picks an implementation once
//! and hands it down.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::domain::aggregates::{line_items, Customer, Order, OrderPatch, OrderStatus, Product};
use crate::domain::value_objects::{ShippableFlag, Weight};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("storage rejected write: {0}")]
    Rejected(String),
}

/// An `orders` row. Line items stay as the raw stored text so rows written
/// by older versions still load.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub province: Option<String>,
    pub items: String,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub extra_cost: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub paid: bool,
    pub status: Option<String>,
    pub seller: Option<String>,
    pub note: Option<String>,
}

impl From<&Order> for OrderRecord {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id.clone(),
            created_at: o.created_at,
            customer_name: o.customer.name.clone(),
            phone: o.customer.phone.clone(),
            address: o.customer.address.clone(),
            province: o.customer.province.clone(),
            items: line_items::encode(&o.items),
            subtotal: o.subtotal,
            shipping: o.shipping,
            discount: o.discount,
            extra_cost: o.extra_cost,
            total: o.total,
            payment_method: o.payment_method.clone(),
            paid: o.paid,
            status: Some(o.status.as_str().to_string()),
            seller: o.seller.clone(),
            note: o.note.clone(),
        }
    }
}

impl OrderRecord {
    /// Converts to the domain order. Unreadable items become an empty list and
    /// a missing status reads as undelivered, both with a warning where the
    /// data was actually malformed.
    pub fn into_order(self) -> Order {
        let items = line_items::decode_or_empty(&self.items, &self.id);
        let status = match self.status.as_deref() {
            None => OrderStatus::Undelivered,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(order_id = %self.id, error = %e, "unknown stored status; reading as undelivered");
                OrderStatus::Undelivered
            }),
        };
        Order {
            id: self.id,
            created_at: self.created_at,
            customer: Customer {
                name: self.customer_name,
                phone: self.phone,
                address: self.address,
                province: self.province,
            },
            items,
            subtotal: self.subtotal,
            shipping: self.shipping,
            discount: self.discount,
            extra_cost: self.extra_cost,
            total: self.total,
            payment_method: self.payment_method,
            paid: self.paid,
            status,
            seller: self.seller,
            note: self.note,
        }
    }
}

/// A `products` row as far as the back office reads it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub promo_price: Option<Decimal>,
    pub import_price: Decimal,
    pub weight: Option<String>,
    pub interprovince: Option<serde_json::Value>,
    pub sold: i64,
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Self {
            weight: Weight::from_optional(r.weight.as_deref()),
            interprovince: ShippableFlag::from_optional(r.interprovince.as_ref()),
            id: r.id,
            name: r.name,
            price: r.price,
            promo_price: r.promo_price,
            import_price: r.import_price,
            sold: r.sold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub seller: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, 100) }
    }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

/// All-time operational counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalCounters {
    /// Status undelivered or no status recorded.
    pub undelivered: i64,
    /// Status delivered and still unpaid.
    pub unpaid_delivered: i64,
    pub bomb: i64,
}

impl OperationalCounters {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a OrderRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut acc, r| {
            match r.status.as_deref() {
                None | Some("undelivered") => acc.undelivered += 1,
                Some("delivered") if !r.paid => acc.unpaid_delivered += 1,
                Some("bomb") => acc.bomb += 1,
                _ => {}
            }
            acc
        })
    }
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order. Returns `false` when the id is already taken.
    async fn insert(&self, record: &OrderRecord) -> Result<bool, StorageError>;
    async fn get(&self, id: &str) -> Result<Option<OrderRecord>, StorageError>;
    /// Newest first.
    async fn list(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<OrderRecord>, i64), StorageError>;
    /// Newest first.
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<OrderRecord>, StorageError>;
    /// Applies a partial update. Returns `false` when no such order exists.
    async fn update(&self, id: &str, patch: &OrderPatch) -> Result<bool, StorageError>;
    /// Returns `false` when no such order exists.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
    /// Orders with `from <= created_at <= to`.
    async fn created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<OrderRecord>, StorageError>;
    async fn operational_counters(&self) -> Result<OperationalCounters, StorageError>;
}

/// The slice of the product catalog the back office depends on.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn products(&self, ids: &[String]) -> Result<Vec<ProductRecord>, StorageError>;
    /// Adds `delta` to the product's sold counter, never going below zero.
    /// Returns `false` when the product does not exist.
    async fn apply_sold_delta(&self, id: &str, delta: i64) -> Result<bool, StorageError>;
}

/// Loads the given products keyed by id. Unknown ids are simply absent.
pub async fn products_by_id(catalog: &dyn ProductCatalog, ids: &[String]) -> Result<HashMap<String, Product>, StorageError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();
    Ok(catalog
        .products(&unique)
        .await?
        .into_iter()
        .map(|r| (r.id.clone(), Product::from(r)))
        .collect())
}
