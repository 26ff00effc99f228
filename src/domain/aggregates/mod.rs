//! Aggregates module
pub mod cart;
pub mod line_items;
pub mod order;
pub mod product;

pub use cart::{Cart, CartError, CartItem, PricedCart};
pub use line_items::{merge_lines, LineItem};
pub use order::{Charges, Customer, Order, OrderPatch, OrderStatus, UnknownStatus};
pub use product::Product;
