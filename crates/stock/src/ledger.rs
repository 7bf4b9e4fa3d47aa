//! Stock ledger: validate every stock-tracked line first, then deduct.
//!
//! A placement either deducts all of its stock-tracked products or none of them.
//! Shortages are collected across every product before anything is touched, so a
//! caller learns the complete list of what is missing in one failure.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use cafekiosk_core::index_by_id;
use cafekiosk_products::{Product, ProductNumber};

use crate::stock::Stock;

/// One stock-tracked product the request needs more of than is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortage {
    pub product_number: ProductNumber,
    pub requested: u32,
    pub available: u32,
}

impl fmt::Display for Shortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (requested: {}, available: {})",
            self.product_number, self.requested, self.available
        )
    }
}

/// The request cannot be served from stock. Shortages are sorted by product number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient stock: {}", render_shortages(.shortages))]
pub struct InsufficientStock {
    pub shortages: Vec<Shortage>,
}

fn render_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Distinct stock-tracked product numbers, in first-occurrence order.
pub fn stock_tracked_numbers(products: &[Product]) -> Vec<ProductNumber> {
    let mut numbers: Vec<ProductNumber> = Vec::new();
    for product in products.iter().filter(|p| p.is_stock_tracked()) {
        if !numbers.contains(product.product_number()) {
            numbers.push(product.product_number().clone());
        }
    }
    numbers
}

/// Required units per stock-tracked product.
pub fn count_by_product(products: &[Product]) -> BTreeMap<ProductNumber, u32> {
    let mut counts = BTreeMap::new();
    for product in products.iter().filter(|p| p.is_stock_tracked()) {
        *counts.entry(product.product_number().clone()).or_insert(0u32) += 1;
    }
    counts
}

/// Validated deductions, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionPlan {
    /// Each loaded entry with the quantity it keeps after the deduction.
    entries: Vec<(Stock, u32)>,
}

impl DeductionPlan {
    /// Apply every deduction and return the updated entries (sorted by product number).
    pub fn apply(self) -> Vec<Stock> {
        self.entries
            .into_iter()
            .map(|(mut stock, remaining)| {
                stock.set_remaining(remaining);
                stock
            })
            .collect()
    }
}

/// Pass one: check availability of every stock-tracked product in the request.
///
/// `stocks` may contain unrelated entries; they are ignored. A stock-tracked product
/// without an entry is treated as having zero units.
pub fn plan_deductions(
    products: &[Product],
    stocks: Vec<Stock>,
) -> Result<DeductionPlan, InsufficientStock> {
    let counts = count_by_product(products);
    let mut by_number = index_by_id(stocks);

    let mut shortages = Vec::new();
    let mut entries = Vec::with_capacity(counts.len());

    for (product_number, requested) in counts {
        match by_number.remove(&product_number) {
            Some(stock) => match stock.remaining_after(requested) {
                Some(remaining) => entries.push((stock, remaining)),
                None => shortages.push(Shortage {
                    available: stock.quantity(),
                    product_number,
                    requested,
                }),
            },
            None => shortages.push(Shortage {
                available: 0,
                product_number,
                requested,
            }),
        }
    }

    if shortages.is_empty() {
        Ok(DeductionPlan { entries })
    } else {
        Err(InsufficientStock { shortages })
    }
}

/// Pass one and pass two in one call.
pub fn deduct_all(
    products: &[Product],
    stocks: Vec<Stock>,
) -> Result<Vec<Stock>, InsufficientStock> {
    plan_deductions(products, stocks).map(DeductionPlan::apply)
}
