//! Optimistic concurrency primitives shared by versioned records.

use crate::error::{DomainError, DomainResult};

/// A record whose state changes are tracked by a monotonically increasing version.
pub trait Versioned {
    /// Version of the record as it was loaded.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation: the version a record was loaded at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(u64);

impl ExpectedVersion {
    /// Expect the version the record was loaded with.
    pub fn of<V: Versioned>(record: &V) -> Self {
        ExpectedVersion(record.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {}, actual: {actual})",
                self.0
            )))
        }
    }
}
