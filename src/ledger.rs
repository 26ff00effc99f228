//! Order ledger: the life cycle of order records and the sold counters they
//! drive.
//!
//! Every call reads from storage afresh; nothing is cached between calls. The
//! order row is the source of truth. Sold counters are a derived convenience,
//! so their updates run as independent steps after the order write and a
//! failed step is logged and skipped rather than undoing the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::aggregates::{line_items, merge_lines, Charges, Customer, LineItem, Order, OrderPatch, OrderStatus};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::Sellers;
use crate::notify::Notifier;
use crate::storage::{OrderFilter, OrderRecord, OrderStore, Page, ProductCatalog};
use crate::{BackofficeError, Result};

/// Attempts at finding a free `prefix + timestamp` id before giving up.
const ID_ATTEMPTS: i64 = 50;

/// Everything needed to record a new order. Shipping and discount are
/// computed upstream and taken as given.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub customer: Customer,
    pub lines: Vec<LineItem>,
    pub payment_method: String,
    pub seller: Option<String>,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub extra_cost: Decimal,
    pub note: Option<String>,
}

pub struct OrderLedger {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    notifier: Arc<dyn Notifier>,
    sellers: Sellers,
    id_prefix: String,
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BackofficeError::Validation(message.to_string()));
    }
    Ok(())
}

impl OrderLedger {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        notifier: Arc<dyn Notifier>,
        sellers: Sellers,
        id_prefix: impl Into<String>,
    ) -> Self {
        Self { orders, catalog, notifier, sellers, id_prefix: id_prefix.into() }
    }

    fn check_seller(&self, seller: Option<&str>) -> Result<()> {
        match seller {
            Some(s) if !self.sellers.contains(s) => Err(BackofficeError::Validation(format!("unknown seller '{s}'"))),
            _ => Ok(()),
        }
    }

    pub async fn create_order(&self, new: NewOrder) -> Result<Order> {
        self.create_order_at(new, Utc::now()).await
    }

    /// Records an order as of `now`, then bumps the sold counter of every
    /// catalog product it references.
    pub async fn create_order_at(&self, new: NewOrder, now: DateTime<Utc>) -> Result<Order> {
        require(&new.customer.name, "customer name is required")?;
        require(&new.customer.phone, "customer phone is required")?;
        let lines = merge_lines(new.lines);
        if lines.is_empty() {
            return Err(BackofficeError::Validation("order has no line items".into()));
        }
        self.check_seller(new.seller.as_deref())?;
        let seller = Some(self.sellers.attribute(new.seller.as_deref()).to_string());

        let charges = Charges { shipping: new.shipping, discount: new.discount, extra_cost: new.extra_cost };
        let mut order = Order::place(String::new(), now, new.customer, lines, charges, new.payment_method, seller);
        order.note = new.note;

        let base = now.timestamp_millis();
        let mut inserted = false;
        for attempt in 0..ID_ATTEMPTS {
            order.id = format!("{}{}", self.id_prefix, base + attempt);
            if self.orders.insert(&OrderRecord::from(&order)).await? {
                inserted = true;
                break;
            }
        }
        if !inserted {
            return Err(BackofficeError::Validation("could not allocate an order id, retry".into()));
        }
        info!(order_id = %order.id, total = %order.total, "order created");

        for line in &order.items {
            if let Some(product_id) = &line.id {
                self.adjust_sold(&order.id, product_id, line.qty).await;
            }
        }

        self.notifier.publish(OrderEvent::Created {
            order_id: order.id.clone(),
            customer: order.customer.name.clone(),
            phone: order.customer.phone.clone(),
            total: order.total,
            seller: self.sellers.attribute(order.seller.as_deref()).to_string(),
        });
        Ok(order)
    }

    async fn adjust_sold(&self, order_id: &str, product_id: &str, delta: i64) {
        if delta == 0 {
            return;
        }
        match self.catalog.apply_sold_delta(product_id, delta).await {
            Ok(true) => debug!(order_id, product_id, delta, "sold count adjusted"),
            Ok(false) => debug!(order_id, product_id, "line refers to no catalog product; sold count untouched"),
            Err(e) => warn!(order_id, product_id, delta, error = %e, "sold count update failed; skipping"),
        }
    }

    pub async fn get_order(&self, id: &str) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .map(OrderRecord::into_order)
            .ok_or_else(|| BackofficeError::OrderNotFound(id.to_string()))
    }

    pub async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, i64)> {
        let (rows, total) = self.orders.list(filter, page).await?;
        Ok((rows.into_iter().map(OrderRecord::into_order).collect(), total))
    }

    pub async fn lookup_by_phone(&self, phone: &str) -> Result<Vec<Order>> {
        require(phone, "phone is required")?;
        let rows = self.orders.find_by_phone(phone.trim()).await?;
        Ok(rows.into_iter().map(OrderRecord::into_order).collect())
    }

    /// Applies only the fields present in `patch`. Edited line lists are
    /// merged first. Totals are stored exactly as the caller sent them; an
    /// order whose total no longer matches its parts is logged, not fixed.
    pub async fn update_order(&self, id: &str, mut patch: OrderPatch) -> Result<()> {
        if let Some(v) = &patch.customer_name { require(v, "customer name is required")?; }
        if let Some(v) = &patch.phone { require(v, "customer phone is required")?; }
        if let Some(items) = patch.items.take() {
            let merged = merge_lines(items);
            if merged.is_empty() {
                return Err(BackofficeError::Validation("order has no line items".into()));
            }
            patch.items = Some(merged);
        }
        self.check_seller(patch.seller.as_deref())?;

        if !self.orders.update(id, &patch).await? {
            return Err(BackofficeError::OrderNotFound(id.to_string()));
        }
        self.verify_total(id).await;
        Ok(())
    }

    async fn verify_total(&self, id: &str) {
        match self.orders.get(id).await {
            Ok(Some(record)) => {
                let order = record.into_order();
                if let Some(drift) = order.total_drift() {
                    warn!(
                        order_id = id,
                        total = %order.total,
                        expected = %order.expected_total(),
                        drift = %drift,
                        "order total does not match subtotal + shipping - discount + extra cost"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(order_id = id, error = %e, "could not re-read order for total check"),
        }
    }

    /// Reverses the order's sold counts, then removes it. A stored item list
    /// that cannot be read skips the reversal but the order is still deleted.
    pub async fn delete_order(&self, id: &str) -> Result<()> {
        let record = self.orders.get(id).await?.ok_or_else(|| BackofficeError::OrderNotFound(id.to_string()))?;
        match line_items::decode(&record.items) {
            Ok(lines) => {
                for line in &lines {
                    if let Some(product_id) = &line.id {
                        self.adjust_sold(id, product_id, -line.qty).await;
                    }
                }
            }
            Err(e) => warn!(order_id = id, error = %e, "stored line items unreadable; sold counts not reversed"),
        }
        if !self.orders.delete(id).await? {
            return Err(BackofficeError::OrderNotFound(id.to_string()));
        }
        info!(order_id = id, "order deleted");
        self.notifier.publish(OrderEvent::Deleted { order_id: id.to_string() });
        Ok(())
    }

    /// Sets the paid flag. Setting it to the value it already has writes
    /// nothing and returns the order as stored.
    pub async fn set_paid(&self, id: &str, paid: bool) -> Result<Order> {
        let current = self.get_order(id).await?;
        if current.paid == paid {
            return Ok(current);
        }
        if !self.orders.update(id, &OrderPatch::paid(paid)).await? {
            return Err(BackofficeError::OrderNotFound(id.to_string()));
        }
        self.notifier.publish(OrderEvent::PaymentChanged { order_id: id.to_string(), paid });
        self.get_order(id).await
    }

    /// Any status may follow any other.
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> Result<Order> {
        if !self.orders.update(id, &OrderPatch::status(status)).await? {
            return Err(BackofficeError::OrderNotFound(id.to_string()));
        }
        self.notifier.publish(OrderEvent::StatusChanged { order_id: id.to_string(), status });
        self.get_order(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::storage::{MemoryStore, ProductRecord};

    fn d(v: i64) -> Decimal { Decimal::from(v) }

    async fn setup() -> (Arc<MemoryStore>, RecordingNotifier, OrderLedger) {
        let store = Arc::new(MemoryStore::new());
        for (id, sold) in [("P1", 0), ("P2", 10)] {
            store
                .put_product(ProductRecord {
                    id: id.into(),
                    name: id.into(),
                    price: d(100_000),
                    promo_price: None,
                    import_price: d(50_000),
                    weight: Some("1".into()),
                    interprovince: None,
                    sold,
                })
                .await;
        }
        let notifier = RecordingNotifier::default();
        let ledger = OrderLedger::new(
            store.clone(),
            store.clone(),
            Arc::new(notifier.clone()),
            Sellers::new(["an", "binh"]).unwrap(),
            "DH",
        );
        (store, notifier, ledger)
    }

    fn new_order(lines: Vec<LineItem>) -> NewOrder {
        NewOrder {
            customer: Customer { name: "Lan".into(), phone: "0905111222".into(), address: "1 Le Loi".into(), province: None },
            lines,
            payment_method: "cod".into(),
            seller: None,
            shipping: d(30_000),
            discount: d(0),
            extra_cost: d(0),
            note: None,
        }
    }

    #[tokio::test]
    async fn test_create_merges_and_counts() {
        let (store, notifier, ledger) = setup().await;
        let order = ledger
            .create_order(new_order(vec![
                LineItem::catalog("P1", "Tea", d(100_000), 2),
                LineItem::catalog("P1", "Tea", d(100_000), 3),
            ]))
            .await
            .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].qty, 5);
        assert_eq!(order.subtotal, d(500_000));
        assert_eq!(order.total, d(530_000));
        assert_eq!(order.seller.as_deref(), Some("an"));
        assert!(order.id.starts_with("DH"));
        assert_eq!(store.sold("P1").await, Some(5));
        assert_eq!(notifier.events().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (_, _, ledger) = setup().await;
        let mut blank = new_order(vec![LineItem::catalog("P1", "Tea", d(1), 1)]);
        blank.customer.phone = "  ".into();
        assert!(matches!(ledger.create_order(blank).await, Err(BackofficeError::Validation(_))));
        assert!(matches!(ledger.create_order(new_order(vec![])).await, Err(BackofficeError::Validation(_))));
        let mut stranger = new_order(vec![LineItem::catalog("P1", "Tea", d(1), 1)]);
        stranger.seller = Some("mallory".into());
        assert!(matches!(ledger.create_order(stranger).await, Err(BackofficeError::Validation(_))));
    }

    #[tokio::test]
    async fn test_same_millisecond_orders_get_distinct_ids() {
        let (store, _, ledger) = setup().await;
        let now = Utc::now();
        let a = ledger.create_order_at(new_order(vec![LineItem::free_text("Box", d(1), 1)]), now).await.unwrap();
        let b = ledger.create_order_at(new_order(vec![LineItem::free_text("Box", d(1), 1)]), now).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_sold_failure_does_not_undo_order() {
        let (store, _, ledger) = setup().await;
        store.fail_sold_updates_for("P1").await;
        let order = ledger
            .create_order(new_order(vec![
                LineItem::catalog("P1", "Tea", d(1), 1),
                LineItem::catalog("P2", "Cup", d(1), 4),
            ]))
            .await
            .unwrap();
        assert!(ledger.get_order(&order.id).await.is_ok());
        assert_eq!(store.sold("P1").await, Some(0));
        assert_eq!(store.sold("P2").await, Some(14));
    }

    #[tokio::test]
    async fn test_delete_reverses_and_floors() {
        let (store, _, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::catalog("P1", "Tea", d(1), 5)])).await.unwrap();
        assert_eq!(store.sold("P1").await, Some(5));
        // someone else already pulled the counter down
        store.apply_sold_delta("P1", -3).await.unwrap();
        ledger.delete_order(&order.id).await.unwrap();
        assert_eq!(store.sold("P1").await, Some(0));
        assert!(matches!(ledger.delete_order(&order.id).await, Err(BackofficeError::OrderNotFound(_))));
        assert_eq!(store.sold("P1").await, Some(0));
    }

    #[tokio::test]
    async fn test_delete_with_malformed_items_still_deletes() {
        let (store, _, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::catalog("P2", "Cup", d(1), 2)])).await.unwrap();
        store.put_order(OrderRecord { items: "{broken".into(), ..OrderRecord::from(&order) }).await;
        ledger.delete_order(&order.id).await.unwrap();
        assert_eq!(store.sold("P2").await, Some(12));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_is_partial_and_trusts_totals() {
        let (_, _, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::catalog("P1", "Tea", d(100_000), 1)])).await.unwrap();
        let patch = OrderPatch { extra_cost: Some(d(5_000)), seller: Some("binh".into()), ..OrderPatch::default() };
        ledger.update_order(&order.id, patch).await.unwrap();
        let stored = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(stored.extra_cost, d(5_000));
        assert_eq!(stored.seller.as_deref(), Some("binh"));
        assert_eq!(stored.total, order.total);
        assert_eq!(stored.total_drift(), Some(d(-5_000)));
        assert_eq!(stored.customer, order.customer);
    }

    #[tokio::test]
    async fn test_update_merges_edited_items() {
        let (store, _, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::catalog("P1", "Tea", d(10), 1)])).await.unwrap();
        let patch = OrderPatch {
            items: Some(vec![LineItem::free_text("Box", d(5), 1), LineItem::free_text(" box ", d(5), 2)]),
            ..OrderPatch::default()
        };
        ledger.update_order(&order.id, patch).await.unwrap();
        let stored = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(stored.items, vec![LineItem::free_text(" box ", d(5), 3)]);
        // edits do not move sold counters
        assert_eq!(store.sold("P1").await, Some(1));
        let missing = ledger.update_order("DH0", OrderPatch::paid(true)).await;
        assert!(matches!(missing, Err(BackofficeError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_paid_is_idempotent() {
        let (_, notifier, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::free_text("Box", d(1), 1)])).await.unwrap();
        assert!(ledger.set_paid(&order.id, true).await.unwrap().paid);
        assert!(ledger.set_paid(&order.id, true).await.unwrap().paid);
        assert!(!ledger.set_paid(&order.id, false).await.unwrap().paid);
        let payment_events = notifier
            .events()
            .into_iter()
            .filter(|e| matches!(e, OrderEvent::PaymentChanged { .. }))
            .count();
        assert_eq!(payment_events, 2);
    }

    #[tokio::test]
    async fn test_set_status_any_transition() {
        let (_, _, ledger) = setup().await;
        let order = ledger.create_order(new_order(vec![LineItem::free_text("Box", d(1), 1)])).await.unwrap();
        for status in [OrderStatus::Bomb, OrderStatus::Undelivered, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(ledger.set_status(&order.id, status).await.unwrap().status, status);
        }
        assert!(matches!(ledger.set_status("nope", OrderStatus::Bomb).await, Err(BackofficeError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_by_phone() {
        let (_, _, ledger) = setup().await;
        ledger.create_order(new_order(vec![LineItem::free_text("Box", d(1), 1)])).await.unwrap();
        assert_eq!(ledger.lookup_by_phone("0905111222").await.unwrap().len(), 1);
        assert!(ledger.lookup_by_phone("000").await.unwrap().is_empty());
    }
}
