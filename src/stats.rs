//! Revenue and profit over a reporting period, split by seller.
//!
//! Revenue and profit cover orders created between the start of the period
//! and `now`. The operational counters always cover the whole order history.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::domain::aggregates::{Order, Product};
use crate::domain::value_objects::Sellers;
use crate::storage::{products_by_id, OperationalCounters, OrderRecord, OrderStore, ProductCatalog};
use crate::{BackofficeError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for Period {
    type Err = BackofficeError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(BackofficeError::Validation(format!("unknown period '{other}'"))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

/// Local midnight opening the period that contains `now`. Weeks start on
/// Monday.
pub fn period_start(period: Period, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let today = now.date_naive();
    let first_day = match period {
        Period::Day => today,
        Period::Week => today - Duration::days(i64::from(today.weekday().num_days_from_monday())),
        Period::Month => today.with_day(1).unwrap_or(today),
        Period::Year => today.with_ordinal(1).unwrap_or(today),
    };
    let midnight = first_day.and_time(NaiveTime::MIN);
    now.timezone().from_local_datetime(&midnight).single().unwrap_or(now)
}

/// A figure for all sellers together and for each seller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSplit {
    pub total: i64,
    pub by_seller: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub period: Period,
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
    pub order_count: usize,
    pub revenue: SellerSplit,
    pub profit: SellerSplit,
    #[serde(flatten)]
    pub counters: OperationalCounters,
}

/// Rounds half up to whole currency units.
fn round_unit(value: Decimal) -> i64 {
    (value + Decimal::new(5, 1)).floor().to_i64().unwrap_or(0)
}

#[derive(Default)]
struct Accumulator {
    total: Decimal,
    by_seller: BTreeMap<String, Decimal>,
}

impl Accumulator {
    fn seeded(sellers: &Sellers) -> Self {
        Self {
            total: Decimal::ZERO,
            by_seller: sellers.names().iter().map(|s| (s.clone(), Decimal::ZERO)).collect(),
        }
    }

    fn add(&mut self, seller: &str, amount: Decimal) {
        self.total += amount;
        *self.by_seller.entry(seller.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    fn finish(self) -> SellerSplit {
        SellerSplit {
            total: round_unit(self.total),
            by_seller: self.by_seller.into_iter().map(|(k, v)| (k, round_unit(v))).collect(),
        }
    }
}

/// Profit of one order: margin of every catalog line at today's product
/// pricing, less the order's extra cost. Lines whose product is gone add
/// nothing.
pub fn order_profit(order: &Order, products: &HashMap<String, Product>) -> Decimal {
    let margin: Decimal = order
        .items
        .iter()
        .filter_map(|line| {
            let product = products.get(line.id.as_deref()?);
            if product.is_none() {
                debug!(order_id = %order.id, product_id = ?line.id, "line product missing from catalog");
            }
            product.map(|p| p.unit_margin() * Decimal::from(line.qty))
        })
        .sum();
    margin - order.extra_cost
}

/// Revenue and profit of `orders`, unrounded until the final figures.
pub fn tally(orders: &[Order], products: &HashMap<String, Product>, sellers: &Sellers) -> (SellerSplit, SellerSplit) {
    let mut revenue = Accumulator::seeded(sellers);
    let mut profit = Accumulator::seeded(sellers);
    for order in orders {
        let seller = sellers.attribute(order.seller.as_deref());
        revenue.add(seller, order.net_revenue());
        profit.add(seller, order_profit(order, products));
    }
    (revenue.finish(), profit.finish())
}

pub struct StatsAggregator {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    sellers: Sellers,
    offset: FixedOffset,
}

impl StatsAggregator {
    pub fn new(orders: Arc<dyn OrderStore>, catalog: Arc<dyn ProductCatalog>, sellers: Sellers, offset: FixedOffset) -> Self {
        Self { orders, catalog, sellers, offset }
    }

    pub async fn aggregate(&self, period: Period, now: DateTime<Utc>) -> Result<Stats> {
        let to = now.with_timezone(&self.offset);
        let from = period_start(period, to);

        let orders: Vec<Order> = self
            .orders
            .created_between(from.with_timezone(&Utc), now)
            .await?
            .into_iter()
            .map(OrderRecord::into_order)
            .collect();
        let ids: Vec<String> = orders.iter().flat_map(|o| o.product_ids().map(str::to_string)).collect();
        let products = products_by_id(self.catalog.as_ref(), &ids).await?;
        let (revenue, profit) = tally(&orders, &products, &self.sellers);
        let counters = self.orders.operational_counters().await?;

        Ok(Stats { period, from, to, order_count: orders.len(), revenue, profit, counters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Charges, Customer, LineItem};
    use crate::domain::value_objects::{ShippableFlag, Weight};

    fn tz() -> FixedOffset { FixedOffset::east_opt(7 * 3600).unwrap() }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_period_starts() {
        // 2024-05-15 is a Wednesday
        let now = at(2024, 5, 15, 14);
        assert_eq!(period_start(Period::Day, now), tz().with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap());
        assert_eq!(period_start(Period::Week, now), tz().with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
        assert_eq!(period_start(Period::Month, now), tz().with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(period_start(Period::Year, now), tz().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_week_start_on_sunday_and_monday() {
        assert_eq!(period_start(Period::Week, at(2024, 5, 19, 9)), tz().with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
        assert_eq!(period_start(Period::Week, at(2024, 5, 13, 9)), tz().with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("month".parse::<Period>().unwrap(), Period::Month);
        assert!("decade".parse::<Period>().is_err());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_unit(Decimal::new(25, 1)), 3);
        assert_eq!(round_unit(Decimal::new(24, 1)), 2);
        assert_eq!(round_unit(Decimal::new(-25, 1)), -2);
    }

    fn order(seller: Option<&str>, lines: Vec<LineItem>, shipping: i64, extra: i64, total: i64) -> Order {
        let mut o = Order::place(
            "DH1",
            Utc::now(),
            Customer::default(),
            lines,
            Charges { shipping: Decimal::from(shipping), discount: Decimal::ZERO, extra_cost: Decimal::from(extra) },
            "cod",
            seller.map(str::to_string),
        );
        o.total = Decimal::from(total);
        o
    }

    fn catalog() -> HashMap<String, Product> {
        let p = Product {
            id: "P1".into(),
            name: "Tea".into(),
            price: Decimal::from(120_000),
            promo_price: Some(Decimal::from(100_000)),
            import_price: Decimal::from(50_000),
            weight: Weight::default(),
            interprovince: ShippableFlag::NO,
            sold: 0,
        };
        HashMap::from([(p.id.clone(), p)])
    }

    #[test]
    fn test_profit_uses_current_catalog_price() {
        // captured price is ignored
        let o = order(None, vec![LineItem::catalog("P1", "Tea", Decimal::from(1), 2)], 0, 0, 0);
        assert_eq!(order_profit(&o, &catalog()), Decimal::from(100_000));
        let o = order(None, vec![LineItem::catalog("P1", "Tea", Decimal::from(1), 2), LineItem::free_text("Box", Decimal::from(9), 1)], 0, 3_000, 0);
        assert_eq!(order_profit(&o, &catalog()), Decimal::from(97_000));
    }

    #[test]
    fn test_tally_splits_by_seller() {
        let sellers = Sellers::new(["an", "binh"]).unwrap();
        let orders = [
            order(None, vec![], 30_000, 0, 130_000),
            order(Some("binh"), vec![LineItem::catalog("P1", "Tea", Decimal::ZERO, 1)], 35_000, 5_000, 200_000),
            order(Some("chi"), vec![], 0, 0, 1_000),
        ];
        let (revenue, profit) = tally(&orders, &catalog(), &sellers);
        assert_eq!(revenue.total, 261_000);
        assert_eq!(revenue.by_seller["an"], 100_000);
        assert_eq!(revenue.by_seller["binh"], 160_000);
        assert_eq!(revenue.by_seller["chi"], 1_000);
        assert_eq!(profit.total, 45_000);
        assert_eq!(profit.by_seller["an"], 0);
        assert_eq!(profit.by_seller["binh"], 45_000);
    }

    #[test]
    fn test_rounding_happens_once() {
        let sellers = Sellers::new(["an"]).unwrap();
        let mk = |total: i64| {
            let mut o = order(None, vec![], 0, 0, 0);
            o.total = Decimal::new(total, 1);
            o
        };
        // 0.4 + 0.4 + 0.4 = 1.2 -> 1, rounding each first would give 0
        let (revenue, _) = tally(&[mk(4), mk(4), mk(4)], &HashMap::new(), &sellers);
        assert_eq!(revenue.total, 1);
    }
}
