//! Value objects for the back office.
//!
//! Catalog and historical order data arrive in loose shapes (weights typed by
//! hand, flags stored as numbers or strings, quantities as strings). Each
//! type here owns one coercion with an explicit fallback so the rest of the
//! crate only sees normalized values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Product weight in kilograms. Zero means unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Weight(Decimal);

impl Weight {
    pub fn kg(value: Decimal) -> Self {
        if value > Decimal::ZERO { Self(value) } else { Self(Decimal::ZERO) }
    }

    /// Parses a free-form catalog weight such as `"1,5 kg"` or `"0.3"`.
    ///
    /// Comma and dot are both decimal separators. The leading number is read
    /// and the rest ignored, so `"1.2.3"` is 1.2 and `"2kg"` is 2. Input with
    /// no leading number becomes zero.
    pub fn parse(raw: &str) -> Self {
        let mut number = String::new();
        let mut seen_point = false;
        for c in raw.trim_start().chars() {
            match c {
                '0'..='9' => number.push(c),
                '.' | ',' if !seen_point => {
                    seen_point = true;
                    number.push('.');
                }
                _ => break,
            }
        }
        let number = number.trim_end_matches('.');
        if number.is_empty() {
            return Self::default();
        }
        let number = if number.starts_with('.') { format!("0{number}") } else { number.to_string() };
        Decimal::from_str(&number).map(Self::kg).unwrap_or_default()
    }

    pub fn from_optional(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or_default()
    }

    pub fn value(&self) -> Decimal { self.0 }
    pub fn is_unknown(&self) -> bool { self.0.is_zero() }

    pub fn times(&self, qty: i64) -> Self { Self::kg(self.0.saturating_mul(Decimal::from(qty.max(0)))) }
}

impl std::ops::Add for Weight {
    type Output = Weight;
    fn add(self, rhs: Weight) -> Weight { Weight::kg(self.0.saturating_add(rhs.0)) }
}

impl std::iter::Sum for Weight {
    fn sum<I: Iterator<Item = Weight>>(iter: I) -> Weight { iter.fold(Weight::default(), |a, b| a + b) }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}kg", self.0.normalize()) }
}

/// Whether a product may ship outside the home province.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippableFlag(bool);

impl ShippableFlag {
    pub const YES: Self = Self(true);
    pub const NO: Self = Self(false);

    /// Only `1`, `true`, `"1"` and `"true"` count as truthy. Anything else,
    /// including null, is false.
    pub fn from_json(value: &Value) -> Self {
        let truthy = match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() == Some(1.0),
            Value::String(s) => matches!(s.trim(), "1" | "true"),
            _ => false,
        };
        Self(truthy)
    }

    pub fn from_optional(value: Option<&Value>) -> Self {
        value.map(Self::from_json).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool { self.0 }
}

/// Line quantity coerced from whatever a stored or operator-entered line holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Self { Self(value.max(0)) }
    pub fn value(&self) -> i64 { self.0 }

    /// Numbers and numeric strings are accepted (fractions truncate toward
    /// zero); missing, negative or non-numeric values become zero.
    pub fn coerce(value: Option<&Value>) -> Self {
        let parsed = match value {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        };
        Self::new(parsed.unwrap_or(0))
    }
}

/// Money amount coerced from a number or numeric string, zero otherwise.
pub fn coerce_amount(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))
            .unwrap_or(Decimal::ZERO),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Destination province, normalized for comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Province(String);

const ADMIN_PREFIXES: [&str; 5] = ["thành phố ", "tp. ", "tp.", "tp ", "tỉnh "];

impl Province {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut name = raw.as_ref().trim().to_lowercase();
        for prefix in ADMIN_PREFIXES {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest.trim_start().to_string();
                break;
            }
        }
        Self(name.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn key(&self) -> &str { &self.0 }
}

/// The fixed set of sellers orders can be attributed to. The first one is the
/// default for orders that carry no seller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sellers(Vec<String>);

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SellersError { Empty }
impl std::error::Error for SellersError {}
impl fmt::Display for SellersError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Seller list empty") }
}

impl Sellers {
    pub fn new<I, S>(names: I) -> Result<Self, SellersError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !list.contains(&name) { list.push(name); }
        }
        if list.is_empty() { return Err(SellersError::Empty); }
        Ok(Self(list))
    }

    pub fn default_seller(&self) -> &str { &self.0[0] }
    pub fn names(&self) -> &[String] { &self.0 }
    pub fn contains(&self, name: &str) -> bool { self.0.iter().any(|s| s == name) }

    /// Seller an order is credited to: its own when present, else the default.
    pub fn attribute<'a>(&'a self, seller: Option<&'a str>) -> &'a str {
        match seller {
            Some(s) if !s.is_empty() => s,
            _ => self.default_seller(),
        }
    }
}
