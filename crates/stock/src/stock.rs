use serde::{Deserialize, Serialize};

use cafekiosk_core::{DomainError, DomainResult, Entity, Versioned};
use cafekiosk_products::ProductNumber;

/// Remaining units of a stock-tracked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    product_number: ProductNumber,
    quantity: u32,
    /// Version the entry was loaded at; the store bumps it on every write.
    version: u64,
}

impl Stock {
    /// A freshly registered entry.
    pub fn new(product_number: ProductNumber, quantity: u32) -> Self {
        Self {
            product_number,
            quantity,
            version: 0,
        }
    }

    /// Rebuild an entry from persisted state.
    pub fn restore(product_number: ProductNumber, quantity: u32, version: u64) -> Self {
        Self {
            product_number,
            quantity,
            version,
        }
    }

    pub fn product_number(&self) -> &ProductNumber {
        &self.product_number
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Units left after taking `quantity`, or `None` when fewer are available.
    pub fn remaining_after(&self, quantity: u32) -> Option<u32> {
        self.quantity.checked_sub(quantity)
    }

    pub fn deduct_quantity(&mut self, quantity: u32) -> DomainResult<()> {
        let remaining = self.remaining_after(quantity).ok_or_else(|| {
            DomainError::invariant(format!(
                "not enough stock for product {} (requested: {quantity}, available: {})",
                self.product_number, self.quantity
            ))
        })?;
        self.quantity = remaining;
        Ok(())
    }

    /// Ledger-only: `remaining` comes from [`Stock::remaining_after`].
    pub(crate) fn set_remaining(&mut self, remaining: u32) {
        self.quantity = remaining;
    }
}

impl Entity for Stock {
    type Id = ProductNumber;

    fn id(&self) -> &ProductNumber {
        &self.product_number
    }
}

impl Versioned for Stock {
    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(quantity: u32) -> Stock {
        Stock::new(ProductNumber::new("001"), quantity)
    }

    #[test]
    fn remaining_after_refuses_more_than_available() {
        let stock = stock(2);
        assert_eq!(stock.remaining_after(2), Some(0));
        assert_eq!(stock.remaining_after(3), None);
    }

    #[test]
    fn deduct_quantity_reduces_stock() {
        let mut stock = stock(2);
        stock.deduct_quantity(1).unwrap();
        assert_eq!(stock.quantity(), 1);
    }

    #[test]
    fn deduct_quantity_down_to_zero_is_allowed() {
        let mut stock = stock(2);
        stock.deduct_quantity(2).unwrap();
        assert_eq!(stock.quantity(), 0);
    }

    #[test]
    fn deduct_quantity_refuses_to_go_negative() {
        let mut stock = stock(1);
        let err = stock.deduct_quantity(2).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("available: 1")),
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
        assert_eq!(stock.quantity(), 1);
    }

    #[test]
    fn deduction_keeps_loaded_version() {
        let mut stock = Stock::restore(ProductNumber::new("002"), 5, 4);
        stock.deduct_quantity(3).unwrap();
        assert_eq!(stock.version(), 4);
    }
}
