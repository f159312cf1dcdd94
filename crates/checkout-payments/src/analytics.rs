//! HTTP analytics capture
//!
//! Events are posted from a spawned task so capture never blocks checkout.
//! Failures are logged at `debug` and otherwise ignored.

use reqwest::Client;
use serde::Serialize;

use checkout_core::analytics::CapturedEvent;
use checkout_core::{AnalyticsSink, CheckoutEvent};

use crate::config::AnalyticsConfig;
use crate::error::Result;

/// Capture payload
#[derive(Debug, Serialize)]
struct CapturePayload {
    api_key: String,
    event: &'static str,
    distinct_id: String,
    properties: serde_json::Value,
    uuid: String,
}

impl CapturePayload {
    fn new(api_key: &str, event: CheckoutEvent) -> Self {
        let name = event.name();
        let distinct_id = event.deal_id().to_string();
        let properties = serde_json::to_value(CapturedEvent::now(event)).unwrap_or_default();
        Self {
            api_key: api_key.to_string(),
            event: name,
            distinct_id,
            properties,
            uuid: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Posts events to a capture endpoint
#[derive(Clone, Debug)]
pub struct HttpAnalytics {
    client: Client,
    config: AnalyticsConfig,
}

impl HttpAnalytics {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AnalyticsConfig::from_env()?))
    }
}

impl AnalyticsSink for HttpAnalytics {
    fn capture(&self, event: CheckoutEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = event.name(), "No async runtime, analytics event dropped");
            return;
        };

        let payload = CapturePayload::new(&self.config.api_key, event);
        let request = self.client.post(&self.config.endpoint).json(&payload);

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(event = payload.event, status = %response.status(), "Analytics capture rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(event = payload.event, error = %e, "Analytics capture failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{DealId, Step};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_event_posted_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/capture/"))
            .and(body_partial_json(serde_json::json!({
                "api_key": "phc_test",
                "event": "checkout_drop_off",
                "distinct_id": "d1",
                "properties": {"step": "payment", "time_spent_ms": 1200}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let analytics = HttpAnalytics::new(AnalyticsConfig {
            endpoint: format!("{}/capture/", server.uri()),
            api_key: "phc_test".into(),
        });
        analytics.capture(CheckoutEvent::DropOff {
            deal_id: DealId::from_string("d1"),
            step: Step::Payment,
            time_spent_ms: 1200,
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        server.verify().await;
    }

    #[test]
    fn test_capture_without_runtime_is_dropped() {
        let analytics = HttpAnalytics::new(AnalyticsConfig {
            endpoint: "http://127.0.0.1:9/capture/".into(),
            api_key: "phc_test".into(),
        });
        analytics.capture(CheckoutEvent::PaymentSucceeded {
            deal_id: DealId::from_string("d1"),
            order_id: "ord_1".into(),
        });
    }
}
