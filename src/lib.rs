//! OpenSASE Back Office
//!
//! Order-side engine of a small shop's back office.
//!
//! ## Features
//! - Shipping fees by cart weight and destination province
//! - Merging of duplicate order lines
//! - Order ledger with sold-count bookkeeping on create and delete
//! - Revenue and profit per reporting period, split by seller
//! - Operational counters (undelivered, unpaid deliveries, no-shows)

pub mod api;
pub mod config;
pub mod domain;
pub mod ledger;
pub mod notify;
pub mod stats;
pub mod storage;

pub use domain::aggregates::{Customer, LineItem, Order, OrderPatch, OrderStatus, Product};
pub use ledger::{NewOrder, OrderLedger};
pub use stats::{Period, Stats, StatsAggregator};

use storage::StorageError;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BackofficeError {
    #[error("{0}")]
    Validation(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("storage failure")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, BackofficeError>;
