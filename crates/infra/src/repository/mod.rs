//! Storage boundary for orders and the table existence check.
//!
//! The engine only talks to the traits in [`r#trait`]; the in-memory adapters
//! serve tests/dev and the Postgres adapters serve production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryOrderRepository, InMemoryTableDirectory};
pub use postgres::{PostgresOrderRepository, PostgresTableDirectory};
pub use r#trait::{OrderRepository, RepositoryError, TableDirectory};
