//! Restaurant orders domain module.
//!
//! This crate contains the order lifecycle rules implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): the status state
//! machine, the `Order` aggregate with its owned line items, structural
//! validation and total calculation.

pub mod item;
pub mod order;
pub mod status;
pub mod total;
pub mod validation;

pub use item::{LineItem, OrderItem, OrderItemInput};
pub use order::{Order, OrderDetails, OrderDraft, OrderParts};
pub use status::OrderStatus;
pub use total::calculate_total;
