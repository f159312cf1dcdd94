//! Server Configuration

use std::str::FromStr;

use checkout_core::FeePolicy;
use rust_decimal::Decimal;

/// Settings read once at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub fees: FeePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            fees: FeePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables; unset or unparsable values keep
    /// their defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(rate) = rate_from_env("CHECKOUT_FEE_RATE_US") {
            config.fees.domestic_rate = rate;
        }
        if let Some(rate) = rate_from_env("CHECKOUT_FEE_RATE_INTL") {
            config.fees.international_rate = rate;
        }

        config
    }
}

fn rate_from_env(key: &str) -> Option<Decimal> {
    let raw = std::env::var(key).ok()?;
    match parse_rate(&raw) {
        Some(rate) => Some(rate),
        None => {
            tracing::warn!(key, value = %raw, "Ignoring invalid fee rate");
            None
        }
    }
}

/// A fee rate is a fraction in `[0, 1)`
fn parse_rate(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|rate| *rate >= Decimal::ZERO && *rate < Decimal::ONE)
}
