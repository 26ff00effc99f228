//! Product read model.
//!
//! The catalog owns products; the back office only reads pricing, cost and
//! shipping fields, and moves the sold counter through the catalog port.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::value_objects::{ShippableFlag, Weight};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub promo_price: Option<Decimal>,
    pub import_price: Decimal,
    pub weight: Weight,
    pub interprovince: ShippableFlag,
    pub sold: i64,
}

impl Product {
    fn promo(&self) -> Option<Decimal> {
        self.promo_price.filter(|p| *p > Decimal::ZERO)
    }

    /// Price shown to customers: the promotion only when it undercuts the
    /// list price.
    pub fn display_price(&self) -> Decimal {
        match self.promo() {
            Some(p) if p < self.price => p,
            _ => self.price,
        }
    }

    /// Price used for profit reporting: any promotion wins over the list price.
    pub fn effective_sale_price(&self) -> Decimal {
        self.promo().unwrap_or(self.price)
    }

    pub fn unit_margin(&self) -> Decimal {
        self.effective_sale_price() - self.import_price
    }
}
