//! Orders domain module.
//!
//! Order assembly from resolved products, order status lifecycle, and the sales
//! totals used by daily statistics. Pure domain logic (no IO, no HTTP, no storage).

pub mod order;
pub mod sales;

pub use order::{Order, OrderLine, OrderResult, OrderStatus};
pub use sales::{DayWindow, day_window, total_sales};
