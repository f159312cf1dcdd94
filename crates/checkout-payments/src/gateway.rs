//! Payment Gateway Boundary
//!
//! Card data never reaches this process. The browser-side SDK tokenizes the
//! card and hands us either a payment method id or the SDK's error, which
//! we surface to the customer verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GENERIC_FAILURE, PaymentError, Result};

/// What the card form produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CardCapture {
    /// Tokenization succeeded
    Token { payment_method_id: String },

    /// The SDK reported an error; `error` is its raw message, possibly a
    /// JSON document with a `message` field
    Failed { error: String },
}

/// Name and email passed along with the card for tokenization
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardholder {
    pub name: String,
    pub email: String,
}

/// Turns a card capture into a payment method id
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn tokenize(&self, capture: &CardCapture, cardholder: &Cardholder) -> Result<String>;
}

/// Gateway for client-side tokenization: the token is already in hand
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientSideGateway;

#[async_trait]
impl PaymentGateway for ClientSideGateway {
    async fn tokenize(&self, capture: &CardCapture, cardholder: &Cardholder) -> Result<String> {
        match capture {
            CardCapture::Token { payment_method_id } if !payment_method_id.trim().is_empty() => {
                tracing::debug!(cardholder = %cardholder.name, "Card tokenized");
                Ok(payment_method_id.trim().to_string())
            }
            CardCapture::Token { .. } => Err(PaymentError::Gateway("Card details are incomplete.".into())),
            CardCapture::Failed { error } => {
                let message = parse_sdk_error(error);
                tracing::warn!(cardholder = %cardholder.name, error = %message, "Card tokenization failed");
                Err(PaymentError::Gateway(message))
            }
        }
    }
}

/// Display message for an SDK error: the `message` field when the error is
/// JSON-encoded, otherwise the raw text
pub fn parse_sdk_error(raw: &str) -> String {
    if raw.trim().is_empty() {
        return GENERIC_FAILURE.to_string();
    }

    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_string))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| raw.to_string())
}
