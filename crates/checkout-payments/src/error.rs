//! Payment Error Types

use checkout_core::CheckoutError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Shown when the backend gives no usable message
pub const GENERIC_FAILURE: &str = "Payment processing failed. Please try again.";

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Transport failure talking to the backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the request
    #[error("Backend error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Backend {
        status: u16,
        /// Display-safe message extracted from the structured error payload
        message: Option<String>,
        /// Machine error code, when provided
        code: Option<String>,
    },

    /// Deal fetch failed; terminal for the session
    #[error("Deal not found: {0}")]
    DealNotFound(String),

    /// Payment SDK returned an error instead of a token
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// A submission for this checkout is already running
    #[error("A payment is already being processed")]
    SubmissionInFlight,

    /// Authorization does not fit the selected payment method
    #[error("Authorization does not match payment method {0}")]
    MethodMismatch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Checkout rule violated before any network call
    #[error(transparent)]
    Core(#[from] CheckoutError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { message: Some(message), .. } => message.clone(),
            Self::Gateway(message) => message.clone(),
            Self::DealNotFound(_) => "We couldn't find this checkout. Please check the link.".into(),
            Self::SubmissionInFlight => "Your payment is already being processed.".into(),
            Self::Core(e) => e.user_message(),
            Self::MethodMismatch(_) => "Please choose pay by cheque before submitting a cheque order.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => GENERIC_FAILURE.into(),
        }
    }
}
