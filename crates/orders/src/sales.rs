//! Sales totals over placed orders.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use cafekiosk_core::{DomainError, DomainResult};

use crate::order::Order;

/// Half-open UTC time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The window covering one calendar day (UTC).
pub fn day_window(date: NaiveDate) -> DomainResult<DayWindow> {
    let next_day = date
        .succ_opt()
        .ok_or_else(|| DomainError::validation(format!("no day follows {date}")))?;

    Ok(DayWindow {
        start: date.and_time(NaiveTime::MIN).and_utc(),
        end: next_day.and_time(NaiveTime::MIN).and_utc(),
    })
}

pub fn total_sales(orders: &[Order]) -> u64 {
    orders.iter().map(Order::total_price).sum()
}
