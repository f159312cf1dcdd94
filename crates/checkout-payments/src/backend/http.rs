//! reqwest-backed backend client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use checkout_core::{Deal, DealId};

use super::{AddressRequest, AddressResponse, CheckoutBackend, OrderDetails, PaymentRequest, PaymentResponse, backend_error};
use crate::config::ApiConfig;
use crate::error::{PaymentError, Result};

/// Backend REST client
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: ApiConfig,
}

impl HttpBackend {
    /// Build a client; the bypass header, when configured, goes on every request
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(bypass) = &config.bypass_header {
            let name = HeaderName::from_bytes(bypass.name.as_bytes())
                .map_err(|e| PaymentError::Config(format!("invalid bypass header name: {e}")))?;
            let value = HeaderValue::from_str(&bypass.value)
                .map_err(|e| PaymentError::Config(format!("invalid bypass header value: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env()?)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn post<B: serde::Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.client.post(self.config.url(path)).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(backend_error(status.as_u16(), &body))
}

#[async_trait]
impl CheckoutBackend for HttpBackend {
    async fn fetch_deal(&self, deal_id: &DealId) -> Result<Deal> {
        let url = self.config.url(&format!("deals/{deal_id}"));
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PaymentError::DealNotFound(deal_id.to_string()));
        }

        let deal: Deal = decode(response).await?;
        tracing::debug!(deal_id = %deal_id, add_ons = deal.add_ons.len(), invoices = deal.invoices.len(), "Deal fetched");
        Ok(deal)
    }

    async fn save_address(&self, request: &AddressRequest) -> Result<AddressResponse> {
        self.post("payments/address", request).await
    }

    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse> {
        tracing::info!(deal_id = %request.order.uuid, amount = %request.amount, "Submitting payment");
        self.post("payments", request).await
    }

    async fn submit_cheque_payment(&self, order: &OrderDetails) -> Result<PaymentResponse> {
        tracing::info!(deal_id = %order.uuid, "Submitting cheque order");
        self.post("payments/cheque-payments", order).await
    }
}
