//! Client Configuration
//!
//! Built once at process start and handed to the clients that need it.

use std::time::Duration;

use crate::error::{PaymentError, Result};

/// Header attached to every request when a tunnelling proxy sits in front of
/// the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BypassHeader {
    pub name: String,
    pub value: String,
}

impl BypassHeader {
    /// Parse `Name: value`
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, value) = raw.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Backend REST API configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL, without trailing slash (e.g. `https://api.example.com/v1`)
    pub base_url: String,

    pub bypass_header: Option<BypassHeader>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bypass_header: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_bypass_header(mut self, header: BypassHeader) -> Self {
        self.bypass_header = Some(header);
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CHECKOUT_API_BASE_URL")
            .map_err(|_| PaymentError::Config("CHECKOUT_API_BASE_URL not set".into()))?;

        let mut config = Self::new(base_url);

        if let Ok(raw) = std::env::var("CHECKOUT_API_BYPASS_HEADER") {
            config.bypass_header = Some(BypassHeader::parse(&raw).ok_or_else(|| {
                PaymentError::Config("CHECKOUT_API_BYPASS_HEADER must look like `Name: value`".into())
            })?);
        }

        if let Some(secs) = std::env::var("CHECKOUT_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Analytics capture service configuration
#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// Capture endpoint (e.g. `https://analytics.example.com/capture/`)
    pub endpoint: String,

    /// Project API key sent with every event
    pub api_key: String,
}

impl AnalyticsConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("CHECKOUT_ANALYTICS_URL")
            .map_err(|_| PaymentError::Config("CHECKOUT_ANALYTICS_URL not set".into()))?;
        let api_key = std::env::var("CHECKOUT_ANALYTICS_KEY")
            .map_err(|_| PaymentError::Config("CHECKOUT_ANALYTICS_KEY not set".into()))?;

        Ok(Self { endpoint, api_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = ApiConfig::new("https://api.example.com/v1/");
        assert_eq!(config.url("/deals/42"), "https://api.example.com/v1/deals/42");
        assert_eq!(config.url("payments"), "https://api.example.com/v1/payments");
    }

    #[test]
    fn test_bypass_header_parse() {
        let header = BypassHeader::parse("ngrok-skip-browser-warning: true").unwrap();
        assert_eq!(header.name, "ngrok-skip-browser-warning");
        assert_eq!(header.value, "true");
        assert!(BypassHeader::parse("no-colon").is_none());
        assert!(BypassHeader::parse(": value").is_none());
    }
}
