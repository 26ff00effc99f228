//! Order line items: the stored `{id?, name, price, qty}` shape and the merge
//! rule that keeps one row per product.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::domain::value_objects::{coerce_amount, Quantity};

/// One product-and-quantity entry of an order. `id` is absent for free-text
/// lines that name something outside the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLineItem")]
pub struct LineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub price: Decimal,
    pub qty: i64,
}

/// Whatever an operator or an old row put in a line. Fields coerce on the way
/// into [`LineItem`]. Where a row carries several spellings of one field the
/// canonical key wins: `id`, `name`, `price`, `qty`.
#[derive(Deserialize)]
struct RawLineItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    product_id: Option<Value>,
    #[serde(default, rename = "productId")]
    product_id_camel: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    unit_price: Option<Value>,
    #[serde(default)]
    qty: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
}

fn first_present<const N: usize>(candidates: [Option<Value>; N]) -> Option<Value> {
    candidates.into_iter().flatten().find(|v| !v.is_null())
}

impl From<RawLineItem> for LineItem {
    fn from(raw: RawLineItem) -> Self {
        let id = match first_present([raw.id, raw.product_id, raw.product_id_camel]) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let name = match first_present([raw.name, raw.title]) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Self {
            id,
            name,
            price: coerce_amount(first_present([raw.price, raw.unit_price]).as_ref()),
            qty: Quantity::coerce(first_present([raw.qty, raw.quantity]).as_ref()).value(),
        }
    }
}

impl LineItem {
    pub fn catalog(id: impl Into<String>, name: impl Into<String>, price: Decimal, qty: i64) -> Self {
        Self { id: Some(id.into()), name: name.into(), price, qty }
    }

    pub fn free_text(name: impl Into<String>, price: Decimal, qty: i64) -> Self {
        Self { id: None, name: name.into(), price, qty }
    }

    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.qty) }

    /// Lines with a product id merge on the id; free-text lines merge on the
    /// trimmed, lower-cased name together with the unit price.
    pub fn identity_key(&self) -> String {
        match &self.id {
            Some(id) => format!("id:{id}"),
            None => format!("name:{}|{}", self.name.trim().to_lowercase(), self.price.normalize()),
        }
    }
}

pub fn subtotal(lines: &[LineItem]) -> Decimal {
    lines.iter().map(LineItem::line_total).sum()
}

/// Collapses lines that share an identity key. Quantities add up across every
/// occurrence; name and price come from the last one seen. Output keeps the
/// position of each key's first appearance.
pub fn merge_lines(lines: Vec<LineItem>) -> Vec<LineItem> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<LineItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let key = line.identity_key();
        match slots.get(&key).copied() {
            Some(at) => {
                let slot = &mut merged[at];
                let qty = slot.qty.saturating_add(line.qty);
                *slot = LineItem { qty, ..line };
            }
            None => {
                slots.insert(key, merged.len());
                merged.push(line);
            }
        }
    }
    merged
}

pub fn encode(lines: &[LineItem]) -> String {
    serde_json::to_string(lines).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a stored item list.
///
/// Fails only when the payload is not a JSON array at all. Elements that are
/// not line objects are skipped with a warning so one bad row entry does not
/// hide the rest of the order.
pub fn decode(raw: &str) -> Result<Vec<LineItem>, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_str(raw)?;
    let mut lines = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<LineItem>(value) {
            Ok(line) => lines.push(line),
            Err(e) => warn!(index, error = %e, "skipping malformed stored line item"),
        }
    }
    Ok(lines)
}

/// Like [`decode`] but an unreadable payload degrades to no lines.
pub fn decode_or_empty(raw: &str, order_id: &str) -> Vec<LineItem> {
    decode(raw).unwrap_or_else(|e| {
        warn!(order_id, error = %e, "stored line items are not a list; treating as empty");
        Vec::new()
    })
}
