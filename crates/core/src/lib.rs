//! `cafekiosk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::{Entity, index_by_id};
pub use error::{DomainError, DomainResult};
pub use id::{MailHistoryId, OrderId};
pub use version::{ExpectedVersion, Versioned};
