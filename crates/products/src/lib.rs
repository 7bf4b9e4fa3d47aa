//! Products domain module.
//!
//! This crate contains business rules for the cafe catalog, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod lookup;
pub mod product;

pub use lookup::{UnknownProduct, distinct_numbers, resolve_requested};
pub use product::{NewProduct, Product, ProductNumber, ProductSellingStatus, ProductType};
