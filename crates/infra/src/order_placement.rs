//! Order placement: lookup, stock deduction and order persistence in one transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{Span, debug, info, instrument, warn};

use cafekiosk_orders::{Order, OrderResult};
use cafekiosk_products::{ProductNumber, UnknownProduct, distinct_numbers, resolve_requested};
use cafekiosk_stock::{InsufficientStock, deduct_all, stock_tracked_numbers};

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum OrderPlacementError {
    #[error("order request contains no products")]
    EmptyRequest,

    #[error(transparent)]
    UnknownProduct(#[from] UnknownProduct),

    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStock),

    #[error("stock was modified concurrently (gave up after {attempts} attempt(s))")]
    ConcurrentModification { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Places orders against a [`Store`].
///
/// Under the optimistic locking policy a placement that loses a stock write race is
/// re-run from scratch, up to the policy's attempt limit. Stock shortages are never
/// retried.
pub struct OrderPlacementProcessor<S> {
    store: S,
}

impl<S> OrderPlacementProcessor<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, requested),
        fields(requested = requested.len(), attempts = tracing::field::Empty),
        err
    )]
    pub async fn create_order(
        &self,
        requested: &[ProductNumber],
        registered_at: DateTime<Utc>,
    ) -> Result<OrderResult, OrderPlacementError> {
        if requested.is_empty() {
            return Err(OrderPlacementError::EmptyRequest);
        }

        let max_attempts = self.store.locking_policy().max_attempts();
        let mut attempt = 1;

        loop {
            Span::current().record("attempts", attempt);

            match self.try_create_order(requested, registered_at).await {
                Err(OrderPlacementError::Store(err)) if err.is_conflict() => {
                    if attempt >= max_attempts {
                        warn!(attempt, reason = %err, "giving up on order placement");
                        return Err(OrderPlacementError::ConcurrentModification {
                            attempts: attempt,
                        });
                    }
                    debug!(attempt, reason = %err, "stock write conflict, retrying placement");
                    attempt += 1;
                }
                Ok(result) => {
                    info!(order_id = %result.id, total_price = result.total_price, "order placed");
                    return Ok(result);
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn try_create_order(
        &self,
        requested: &[ProductNumber],
        registered_at: DateTime<Utc>,
    ) -> Result<OrderResult, OrderPlacementError> {
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_products_by_numbers(&distinct_numbers(requested))
            .await?;
        let products = resolve_requested(requested, found)?;

        let tracked = stock_tracked_numbers(&products);
        let stocks = if tracked.is_empty() {
            Vec::new()
        } else {
            tx.find_stocks_by_numbers(&tracked).await?
        };

        let updated = deduct_all(&products, stocks)?;
        if !updated.is_empty() {
            tx.update_stocks(&updated).await?;
        }

        let order = tx.save_order(Order::create(&products, registered_at)).await?;
        let result = OrderResult::try_from(order)
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        tx.commit().await?;
        Ok(result)
    }
}
