//! Persistence boundary: repositories behind a single transaction handle.
//!
//! Services open a transaction with [`Store::begin`], read and write through the
//! repository traits, and finish with [`StoreTransaction::commit`]. Dropping a
//! transaction without committing rolls back every write made through it.
//!
//! Two backends implement the boundary:
//! - [`InMemoryStore`] for tests and local runs,
//! - [`PostgresStore`] (sqlx) for deployments.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use cafekiosk_orders::{Order, OrderStatus};
use cafekiosk_products::{Product, ProductNumber, ProductSellingStatus};
use cafekiosk_stock::Stock;

use crate::mail::{MailSendHistory, NewMailSendHistory};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Persistence failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A concurrent writer got there first (stale version, duplicate key, serialization
    /// failure). Safe to retry the whole transaction.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    /// A persisted row could not be turned back into a domain value.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// How concurrent placements are kept from overselling stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LockingPolicy {
    /// Stock reads lock the rows until the transaction ends.
    #[default]
    Pessimistic,
    /// Stock writes are version-checked; a losing writer retries.
    Optimistic { max_attempts: u32 },
}

impl LockingPolicy {
    /// How many times a placement may run before giving up on conflicts.
    pub fn max_attempts(self) -> u32 {
        match self {
            LockingPolicy::Pessimistic => 1,
            LockingPolicy::Optimistic { max_attempts } => max_attempts.max(1),
        }
    }

    pub fn locks_on_read(self) -> bool {
        matches!(self, LockingPolicy::Pessimistic)
    }
}

/// Read and register catalog entries.
#[async_trait::async_trait]
pub trait ProductCatalog: Send {
    /// Batch read; unknown numbers are simply absent from the result.
    async fn find_products_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Product>, StoreError>;

    /// Products whose status is one of `statuses`, ordered by product number.
    async fn find_products_by_selling_status(
        &mut self,
        statuses: &[ProductSellingStatus],
    ) -> Result<Vec<Product>, StoreError>;

    /// The most recently assigned product number, if the catalog is not empty.
    async fn find_latest_product_number(&mut self) -> Result<Option<ProductNumber>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the number is already taken.
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
}

/// Read and write stock entries.
#[async_trait::async_trait]
pub trait StockRepository: Send {
    /// Batch read. Under [`LockingPolicy::Pessimistic`] the returned rows stay locked
    /// until the transaction ends.
    async fn find_stocks_by_numbers(
        &mut self,
        numbers: &[ProductNumber],
    ) -> Result<Vec<Stock>, StoreError>;

    /// Persist new quantities. Each entry must still be at the version it was loaded
    /// with, otherwise the write fails with [`StoreError::Conflict`].
    async fn update_stocks(&mut self, stocks: &[Stock]) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Conflict`] if the product already has a stock entry.
    async fn insert_stock(&mut self, stock: &Stock) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait OrderRepository: Send {
    /// Persist a new order and return it with its assigned identifier.
    async fn save_order(&mut self, order: Order) -> Result<Order, StoreError>;

    /// Orders with `status` registered in `[start, end)`, ordered by identifier.
    async fn find_orders_by(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError>;
}

#[async_trait::async_trait]
pub trait MailHistoryRepository: Send {
    async fn save_mail_history(
        &mut self,
        history: NewMailSendHistory,
    ) -> Result<MailSendHistory, StoreError>;

    async fn find_mail_histories(&mut self) -> Result<Vec<MailSendHistory>, StoreError>;
}

/// One unit of work across every repository.
#[async_trait::async_trait]
pub trait StoreTransaction:
    ProductCatalog + StockRepository + OrderRepository + MailHistoryRepository + Send
{
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Transaction factory.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    fn locking_policy(&self) -> LockingPolicy;
}

#[async_trait::async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }

    fn locking_policy(&self) -> LockingPolicy {
        (**self).locking_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pessimistic_runs_once() {
        assert_eq!(LockingPolicy::Pessimistic.max_attempts(), 1);
        assert!(LockingPolicy::Pessimistic.locks_on_read());
    }

    #[test]
    fn optimistic_runs_at_least_once() {
        assert_eq!(LockingPolicy::Optimistic { max_attempts: 0 }.max_attempts(), 1);
        assert_eq!(LockingPolicy::Optimistic { max_attempts: 5 }.max_attempts(), 5);
        assert!(!LockingPolicy::Optimistic { max_attempts: 5 }.locks_on_read());
    }

    #[test]
    fn only_write_conflicts_are_retryable() {
        assert!(StoreError::Conflict("stale".into()).is_conflict());
        assert!(!StoreError::Database("down".into()).is_conflict());
        assert!(!StoreError::InvalidRecord("bad".into()).is_conflict());
    }
}
