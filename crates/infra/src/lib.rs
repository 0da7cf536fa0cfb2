//! Infrastructure layer: order storage adapters and the order lifecycle engine.

pub mod order_service;
pub mod repository;

pub use order_service::{OrderService, ServiceError};
pub use repository::{
    InMemoryOrderRepository, InMemoryTableDirectory, OrderRepository, PostgresOrderRepository,
    PostgresTableDirectory, RepositoryError, TableDirectory,
};
