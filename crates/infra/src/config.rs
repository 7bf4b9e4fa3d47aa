//! Process configuration loaded from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use crate::store::LockingPolicy;

pub const BIND_ADDR: &str = "CAFEKIOSK_BIND_ADDR";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const STOCK_LOCKING: &str = "CAFEKIOSK_STOCK_LOCKING";
pub const STOCK_MAX_ATTEMPTS: &str = "CAFEKIOSK_STOCK_MAX_ATTEMPTS";
pub const MAIL_FROM: &str = "CAFEKIOSK_MAIL_FROM";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAIL_FROM: &str = "no-reply@cafekiosk.com";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub locking_policy: LockingPolicy,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr_raw = get(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid(BIND_ADDR, &bind_addr_raw, e.to_string()))?;

        let max_attempts = match get(STOCK_MAX_ATTEMPTS) {
            None => DEFAULT_MAX_ATTEMPTS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => {
                    return Err(ConfigError::invalid(
                        STOCK_MAX_ATTEMPTS,
                        &raw,
                        "must be at least 1",
                    ));
                }
                Err(e) => {
                    return Err(ConfigError::invalid(STOCK_MAX_ATTEMPTS, &raw, e.to_string()));
                }
            },
        };

        let locking_policy = match get(STOCK_LOCKING) {
            None => LockingPolicy::Pessimistic,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "pessimistic" => LockingPolicy::Pessimistic,
                "optimistic" => LockingPolicy::Optimistic { max_attempts },
                _ => {
                    return Err(ConfigError::invalid(
                        STOCK_LOCKING,
                        &raw,
                        "expected 'pessimistic' or 'optimistic'",
                    ));
                }
            },
        };

        Ok(Self {
            bind_addr,
            database_url: get(DATABASE_URL),
            locking_policy,
            mail_from: get(MAIL_FROM).unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
        })
    }
}
