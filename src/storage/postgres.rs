//! Postgres storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use super::{
    OperationalCounters, OrderFilter, OrderRecord, OrderStore, Page, ProductCatalog, ProductRecord, StorageError,
};
use crate::domain::aggregates::{line_items, OrderPatch};

const ORDER_COLUMNS: &str = "id, created_at, customer_name, phone, address, province, items, subtotal, shipping, \
     discount, extra_cost, total, payment_method, paid, status, seller, note";

const PRODUCT_COLUMNS: &str = "id, name, price, promo_price, import_price, weight, interprovince, sold";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND COALESCE(status, 'undelivered') = ").push_bind(status.as_str());
    }
    if let Some(seller) = &filter.seller {
        qb.push(" AND seller = ").push_bind(seller.clone());
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, r: &OrderRecord) -> Result<bool, StorageError> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT (id) DO NOTHING"
        );
        let done = sqlx::query(&sql)
            .bind(&r.id).bind(r.created_at).bind(&r.customer_name).bind(&r.phone).bind(&r.address)
            .bind(&r.province).bind(&r.items).bind(r.subtotal).bind(r.shipping).bind(r.discount)
            .bind(r.extra_cost).bind(r.total).bind(&r.payment_method).bind(r.paid).bind(&r.status)
            .bind(&r.seller).bind(&r.note)
            .execute(&self.pool).await?;
        Ok(done.rows_affected() == 1)
    }

    async fn get(&self, id: &str) -> Result<Option<OrderRecord>, StorageError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, OrderRecord>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<OrderRecord>, i64), StorageError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(page.limit());
        qb.push(" OFFSET ").push_bind(page.offset());
        let rows = qb.build_query_as::<OrderRecord>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
        Ok((rows, total))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<OrderRecord>, StorageError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE phone = $1 ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, OrderRecord>(&sql).bind(phone).fetch_all(&self.pool).await?)
    }

    async fn update(&self, id: &str, patch: &OrderPatch) -> Result<bool, StorageError> {
        if patch.is_empty() {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(id).fetch_optional(&self.pool).await?;
            return Ok(exists.is_some());
        }
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(v) = &patch.customer_name { set.push("customer_name = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = &patch.phone { set.push("phone = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = &patch.address { set.push("address = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = &patch.province { set.push("province = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = &patch.items { set.push("items = ").push_bind_unseparated(line_items::encode(v)); }
            if let Some(v) = patch.subtotal { set.push("subtotal = ").push_bind_unseparated(v); }
            if let Some(v) = patch.shipping { set.push("shipping = ").push_bind_unseparated(v); }
            if let Some(v) = patch.discount { set.push("discount = ").push_bind_unseparated(v); }
            if let Some(v) = patch.extra_cost { set.push("extra_cost = ").push_bind_unseparated(v); }
            if let Some(v) = patch.total { set.push("total = ").push_bind_unseparated(v); }
            if let Some(v) = &patch.payment_method { set.push("payment_method = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = patch.paid { set.push("paid = ").push_bind_unseparated(v); }
            if let Some(v) = patch.status { set.push("status = ").push_bind_unseparated(v.as_str()); }
            if let Some(v) = &patch.seller { set.push("seller = ").push_bind_unseparated(v.clone()); }
            if let Some(v) = &patch.note { set.push("note = ").push_bind_unseparated(v.clone()); }
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());
        let done = qb.build().execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let done = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<OrderRecord>, StorageError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, OrderRecord>(&sql).bind(from).bind(to).fetch_all(&self.pool).await?)
    }

    async fn operational_counters(&self) -> Result<OperationalCounters, StorageError> {
        let (undelivered, unpaid_delivered, bomb): (i64, i64, i64) = sqlx::query_as(
            "SELECT \
                 COUNT(*) FILTER (WHERE status IS NULL OR status = 'undelivered'), \
                 COUNT(*) FILTER (WHERE status = 'delivered' AND NOT paid), \
                 COUNT(*) FILTER (WHERE status = 'bomb') \
             FROM orders",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(OperationalCounters { undelivered, unpaid_delivered, bomb })
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn products(&self, ids: &[String]) -> Result<Vec<ProductRecord>, StorageError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        Ok(sqlx::query_as::<_, ProductRecord>(&sql).bind(ids).fetch_all(&self.pool).await?)
    }

    async fn apply_sold_delta(&self, id: &str, delta: i64) -> Result<bool, StorageError> {
        let done = sqlx::query("UPDATE products SET sold = GREATEST(sold + $2, 0) WHERE id = $1")
            .bind(id).bind(delta).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}
