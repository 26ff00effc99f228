//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::line_items::{self, LineItem};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub extra_cost: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub paid: bool,
    pub status: OrderStatus,
    pub seller: Option<String>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub province: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Undelivered,
    TomorrowDelivery,
    Delivered,
    Cancelled,
    Bomb,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Undelivered,
        OrderStatus::TomorrowDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Bomb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undelivered => "undelivered",
            Self::TomorrowDelivery => "tomorrow_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Bomb => "bomb",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown order status '{}'", self.0) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Monetary fields of an order, before and after total derivation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Charges {
    pub shipping: Decimal,
    pub discount: Decimal,
    pub extra_cost: Decimal,
}

/// `subtotal + shipping - discount + extra_cost`
pub fn grand_total(subtotal: Decimal, charges: Charges) -> Decimal {
    subtotal + charges.shipping - charges.discount + charges.extra_cost
}

impl Order {
    /// Builds a fresh order: status undelivered, unpaid, subtotal and total
    /// derived from the lines.
    pub fn place(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        customer: Customer,
        items: Vec<LineItem>,
        charges: Charges,
        payment_method: impl Into<String>,
        seller: Option<String>,
    ) -> Self {
        let subtotal = line_items::subtotal(&items);
        Self {
            id: id.into(),
            created_at,
            customer,
            items,
            subtotal,
            shipping: charges.shipping,
            discount: charges.discount,
            extra_cost: charges.extra_cost,
            total: grand_total(subtotal, charges),
            payment_method: payment_method.into(),
            paid: false,
            status: OrderStatus::Undelivered,
            seller,
            note: None,
        }
    }

    pub fn charges(&self) -> Charges {
        Charges { shipping: self.shipping, discount: self.discount, extra_cost: self.extra_cost }
    }

    /// Total recomputed from the current lines and charges.
    pub fn expected_total(&self) -> Decimal {
        grand_total(line_items::subtotal(&self.items), self.charges())
    }

    /// Difference between the stored total and [`Order::expected_total`],
    /// or `None` when they agree.
    pub fn total_drift(&self) -> Option<Decimal> {
        let drift = self.total - self.expected_total();
        (!drift.is_zero()).then_some(drift)
    }

    /// Revenue this order contributes: total less shipping and extra cost.
    pub fn net_revenue(&self) -> Decimal {
        self.total - self.shipping - self.extra_cost
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|l| l.id.as_deref())
    }
}

/// Partial update of the mutable order fields. Absent fields stay as stored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub province: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub subtotal: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub extra_cost: Option<Decimal>,
    pub total: Option<Decimal>,
    pub payment_method: Option<String>,
    pub paid: Option<bool>,
    pub status: Option<OrderStatus>,
    pub seller: Option<String>,
    pub note: Option<String>,
}

impl OrderPatch {
    pub fn paid(paid: bool) -> Self { Self { paid: Some(paid), ..Self::default() } }
    pub fn status(status: OrderStatus) -> Self { Self { status: Some(status), ..Self::default() } }

    pub fn is_empty(&self) -> bool { *self == Self::default() }
}
