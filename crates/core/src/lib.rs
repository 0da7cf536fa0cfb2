//! `bistro-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the exact-decimal `Money` value object, the domain error model and
//! the optimistic concurrency contract shared by every aggregate.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{MenuItemId, OrderId, OrderItemId, TableId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
