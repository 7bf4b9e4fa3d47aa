//! Stock domain module.
//!
//! Stock entries for stock-tracked products and the validate-then-deduct ledger used
//! when an order is placed. Pure domain logic (no IO, no HTTP, no storage).

pub mod ledger;
pub mod stock;

pub use ledger::{
    DeductionPlan, InsufficientStock, Shortage, count_by_product, deduct_all, plan_deductions,
    stock_tracked_numbers,
};
pub use stock::Stock;
