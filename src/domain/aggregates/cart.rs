//! Checkout cart.
//!
//! The storefront submits product ids and quantities. Pricing, weight and
//! shippability come from the catalog, never from the client.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use validator::Validate;

use super::{line_items, LineItem, Product};
use crate::domain::shipping::{is_known_province, ShippingQuote, ShippingRates};
use crate::domain::value_objects::Weight;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct Cart {
    #[serde(default)]
    pub province: Option<String>,
    #[validate(length(min = 1, message = "cart is empty"))]
    pub items: Vec<CartItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct CartItem {
    pub id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Product {0} not found")]
    UnknownProduct(String),
    #[error("Quantity for {0} must be at least 1")]
    InvalidQuantity(String),
    #[error("Discount {0} must be between 0 and the order amount")]
    InvalidDiscount(Decimal),
}

/// A cart priced against the catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedCart {
    pub lines: Vec<LineItem>,
    pub quote: ShippingQuote,
}

impl Cart {
    pub fn product_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    /// Destination, falling back to the home province when none was given.
    pub fn destination<'a>(&'a self, rates: &'a ShippingRates) -> &'a str {
        match self.province.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => &rates.home_province,
        }
    }

    /// Prices every line at the product's display price, totals the weight
    /// and quotes shipping to the cart's destination.
    pub fn price(&self, products: &HashMap<String, Product>, rates: &ShippingRates) -> Result<PricedCart, CartError> {
        let destination = self.destination(rates);
        let mut lines = Vec::with_capacity(self.items.len());
        let mut weight = Weight::default();
        let mut unshippable = Vec::new();
        for item in &self.items {
            if item.qty < 1 {
                return Err(CartError::InvalidQuantity(item.id.clone()));
            }
            let product = products.get(&item.id).ok_or_else(|| CartError::UnknownProduct(item.id.clone()))?;
            if !rates.can_ship(product, destination) {
                unshippable.push(product.id.clone());
            }
            if product.weight.is_unknown() {
                debug!(product_id = %product.id, "product has no usable weight; counted as zero");
            }
            weight = weight + product.weight.times(item.qty);
            lines.push(LineItem::catalog(&product.id, &product.name, product.display_price(), item.qty));
        }
        let quote = ShippingQuote {
            province: destination.to_string(),
            interprovincial: !rates.is_home(destination),
            known_province: is_known_province(destination),
            total_weight_kg: weight.value(),
            fee: rates.compute_shipping(weight, destination),
            unshippable,
        };
        Ok(PricedCart { lines, quote })
    }
}

impl PricedCart {
    pub fn subtotal(&self) -> Decimal { line_items::subtotal(&self.lines) }

    /// Accepts a customer discount only when it is neither negative nor larger
    /// than what the order would cost without it.
    pub fn check_discount(&self, discount: Decimal) -> Result<Decimal, CartError> {
        if discount < Decimal::ZERO || discount > self.subtotal() + self.quote.fee {
            return Err(CartError::InvalidDiscount(discount));
        }
        Ok(discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ShippableFlag;

    fn catalog() -> HashMap<String, Product> {
        let mk = |id: &str, weight: &str, flag: ShippableFlag| Product {
            id: id.into(),
            name: format!("Item {id}"),
            price: Decimal::from(100_000),
            promo_price: Some(Decimal::from(90_000)),
            import_price: Decimal::from(40_000),
            weight: Weight::parse(weight),
            interprovince: flag,
            sold: 0,
        };
        [mk("P1", "2,5", ShippableFlag::YES), mk("P2", "1kg", ShippableFlag::NO)]
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    }

    fn cart(province: &str, items: &[(&str, i64)]) -> Cart {
        Cart {
            province: Some(province.into()),
            items: items.iter().map(|(id, qty)| CartItem { id: id.to_string(), qty: *qty }).collect(),
        }
    }

    #[test]
    fn test_cart_price_interprovincial() {
        let priced = cart("Hà Nội", &[("P1", 3)]).price(&catalog(), &ShippingRates::default()).unwrap();
        assert_eq!(priced.quote.total_weight_kg, Decimal::new(75, 1));
        assert_eq!(priced.quote.fee, Decimal::from(8 * 7_000));
        assert!(priced.quote.interprovincial);
        assert_eq!(priced.lines[0].price, Decimal::from(90_000));
        assert!(priced.quote.is_deliverable());
    }

    #[test]
    fn test_cart_flags_unshippable_items() {
        let priced = cart("Hà Nội", &[("P1", 1), ("P2", 1)]).price(&catalog(), &ShippingRates::default()).unwrap();
        assert_eq!(priced.quote.unshippable, vec!["P2".to_string()]);
        let home = cart("Đà Nẵng", &[("P2", 10)]).price(&catalog(), &ShippingRates::default()).unwrap();
        assert!(home.quote.is_deliverable());
        assert_eq!(home.quote.fee, Decimal::from(30_000));
    }

    #[test]
    fn test_cart_rejects_unknown_product() {
        let err = cart("Hà Nội", &[("P9", 1)]).price(&catalog(), &ShippingRates::default()).unwrap_err();
        assert_eq!(err, CartError::UnknownProduct("P9".into()));
    }

    #[test]
    fn test_cart_defaults_to_home_province() {
        let c = Cart { province: None, items: vec![CartItem { id: "P1".into(), qty: 1 }] };
        assert_eq!(c.destination(&ShippingRates::default()), "Đà Nẵng");
        assert!(c.validate().is_ok());
        let empty = Cart { province: None, items: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_cart_weight_exactly_at_threshold() {
        let mut products = catalog();
        for (id, weight) in [("A", "1,6"), ("B", "0,2")] {
            let p = Product { id: id.into(), weight: Weight::parse(weight), ..products["P1"].clone() };
            products.insert(id.into(), p);
        }
        let priced = cart("Hà Nội", &[("A", 3), ("B", 1)]).price(&products, &ShippingRates::default()).unwrap();
        assert_eq!(priced.quote.total_weight_kg, Decimal::from(5));
        assert_eq!(priced.quote.fee, Decimal::from(35_000));
    }

    #[test]
    fn test_discount_bounds() {
        let priced = cart("Hà Nội", &[("P1", 1)]).price(&catalog(), &ShippingRates::default()).unwrap();
        // 90 000 promo price + 35 000 shipping
        assert_eq!(priced.check_discount(Decimal::from(10_000)), Ok(Decimal::from(10_000)));
        assert_eq!(priced.check_discount(Decimal::from(125_000)), Ok(Decimal::from(125_000)));
        assert!(priced.check_discount(Decimal::from(125_001)).is_err());
        assert_eq!(priced.check_discount(Decimal::from(-1)), Err(CartError::InvalidDiscount(Decimal::from(-1))));
    }
}
