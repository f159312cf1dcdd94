//! Error Types

use thiserror::Error;

use crate::validation::FieldErrors;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Step name not one of `shipping`, `addons`, `payment`
    #[error("Unknown checkout step: {0}")]
    UnknownStep(String),

    /// Section name not recognised by the state store
    #[error("Unknown checkout section: {0}")]
    UnknownSection(String),

    /// Partial section payload could not be decoded
    #[error("Invalid data for section {section}: {reason}")]
    InvalidSectionData { section: String, reason: String },

    /// Add-on or invoice cannot be selected (owned tier, paid, or unknown)
    #[error("Item not selectable: {0}")]
    NotSelectable(String),

    /// Chargeable total is zero, submission refused
    #[error("Total amount must be greater than zero")]
    ZeroTotal,

    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Keyed selection store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownStep(_) => "That checkout step does not exist.".into(),
            Self::NotSelectable(_) => "That item is not available for selection.".into(),
            Self::ZeroTotal => {
                "There is nothing to pay. Please select at least one item before paying.".into()
            }
            Self::Validation(errors) => match errors.first() {
                Some((_, message)) => message.to_string(),
                None => "Please check the highlighted fields.".into(),
            },
            _ => "An unexpected error occurred.".into(),
        }
    }
}
