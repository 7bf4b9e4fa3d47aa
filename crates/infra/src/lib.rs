//! Infrastructure layer: persistence, orchestration services, mail, config.

#![cfg_attr(not(test), deny(unused_imports))]

pub mod config;
pub mod mail;
pub mod order_placement;
pub mod order_statistics;
pub mod products;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use mail::{LoggingMailSendClient, MailSendClient, MailSendHistory, MailService};
pub use order_placement::{OrderPlacementError, OrderPlacementProcessor};
pub use order_statistics::{OrderStatisticsService, StatisticsError};
pub use products::{ProductService, ProductServiceError};
pub use store::{InMemoryStore, LockingPolicy, PostgresStore, Store, StoreError};
