//! In-process storage for tests and database-less local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{
    OperationalCounters, OrderFilter, OrderRecord, OrderStore, Page, ProductCatalog, ProductRecord, StorageError,
};
use crate::domain::aggregates::{line_items, OrderPatch};

#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<String, OrderRecord>>,
    products: RwLock<HashMap<String, ProductRecord>>,
    failing_products: RwLock<HashSet<String>>,
    failing_order_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn put_product(&self, record: ProductRecord) {
        self.products.write().await.insert(record.id.clone(), record);
    }

    /// Stores a raw order row as-is, bypassing the ledger.
    pub async fn put_order(&self, record: OrderRecord) {
        self.orders.write().await.insert(record.id.clone(), record);
    }

    /// Makes every later sold-count update for `product_id` fail.
    pub async fn fail_sold_updates_for(&self, product_id: &str) {
        self.failing_products.write().await.insert(product_id.to_string());
    }

    /// Makes every later order insert, update and delete fail.
    pub fn fail_order_writes(&self) {
        self.failing_order_writes.store(true, Ordering::SeqCst);
    }

    fn check_order_write(&self) -> Result<(), StorageError> {
        if self.failing_order_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("order write".into()));
        }
        Ok(())
    }

    pub async fn sold(&self, product_id: &str) -> Option<i64> {
        self.products.read().await.get(product_id).map(|p| p.sold)
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

fn newest_first(mut rows: Vec<OrderRecord>) -> Vec<OrderRecord> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    rows
}

fn apply_patch(record: &mut OrderRecord, patch: &OrderPatch) {
    if let Some(v) = &patch.customer_name { record.customer_name = v.clone(); }
    if let Some(v) = &patch.phone { record.phone = v.clone(); }
    if let Some(v) = &patch.address { record.address = v.clone(); }
    if let Some(v) = &patch.province { record.province = Some(v.clone()); }
    if let Some(v) = &patch.items { record.items = line_items::encode(v); }
    if let Some(v) = patch.subtotal { record.subtotal = v; }
    if let Some(v) = patch.shipping { record.shipping = v; }
    if let Some(v) = patch.discount { record.discount = v; }
    if let Some(v) = patch.extra_cost { record.extra_cost = v; }
    if let Some(v) = patch.total { record.total = v; }
    if let Some(v) = &patch.payment_method { record.payment_method = v.clone(); }
    if let Some(v) = patch.paid { record.paid = v; }
    if let Some(v) = patch.status { record.status = Some(v.as_str().to_string()); }
    if let Some(v) = &patch.seller { record.seller = Some(v.clone()); }
    if let Some(v) = &patch.note { record.note = Some(v.clone()); }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, record: &OrderRecord) -> Result<bool, StorageError> {
        self.check_order_write()?;
        let mut orders = self.orders.write().await;
        if orders.contains_key(&record.id) {
            return Ok(false);
        }
        orders.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<OrderRecord>, StorageError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn list(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<OrderRecord>, i64), StorageError> {
        let orders = self.orders.read().await;
        let matching: Vec<OrderRecord> = orders
            .values()
            .filter(|r| match filter.status {
                Some(s) => r.status.as_deref().unwrap_or("undelivered") == s.as_str(),
                None => true,
            })
            .filter(|r| match &filter.seller {
                Some(seller) => r.seller.as_ref() == Some(seller),
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let rows = newest_first(matching)
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((rows, total))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<OrderRecord>, StorageError> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.values().filter(|r| r.phone == phone).cloned().collect()))
    }

    async fn update(&self, id: &str, patch: &OrderPatch) -> Result<bool, StorageError> {
        self.check_order_write()?;
        let mut orders = self.orders.write().await;
        match orders.get_mut(id) {
            Some(record) => {
                apply_patch(record, patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.check_order_write()?;
        Ok(self.orders.write().await.remove(id).is_some())
    }

    async fn created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<OrderRecord>, StorageError> {
        let orders = self.orders.read().await;
        Ok(newest_first(
            orders.values().filter(|r| r.created_at >= from && r.created_at <= to).cloned().collect(),
        ))
    }

    async fn operational_counters(&self) -> Result<OperationalCounters, StorageError> {
        Ok(OperationalCounters::tally(self.orders.read().await.values()))
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn products(&self, ids: &[String]) -> Result<Vec<ProductRecord>, StorageError> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn apply_sold_delta(&self, id: &str, delta: i64) -> Result<bool, StorageError> {
        if self.failing_products.read().await.contains(id) {
            return Err(StorageError::Rejected(format!("sold update for {id}")));
        }
        let mut products = self.products.write().await;
        match products.get_mut(id) {
            Some(p) => {
                p.sold = p.sold.saturating_add(delta).max(0);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
