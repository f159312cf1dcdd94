//! Field Validation
//!
//! Per-field errors that block step progression. An error is cleared on the
//! next edit of its field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pricing::PaymentMethod;
use crate::state::{PaymentDetails, ShippingDetails};

/// Field name to message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn first(&self) -> Option<(&str, &str)> {
        self.0.iter().next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "{}", fields.join(", "))
    }
}

fn require(errors: &mut FieldErrors, field: &str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.insert(field, format!("{label} is required"));
    }
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Contact and address checks for the shipping step
pub fn validate_shipping(shipping: &ShippingDetails) -> FieldErrors {
    let mut errors = FieldErrors::new();
    require(&mut errors, "first_name", &shipping.first_name, "First name");
    require(&mut errors, "last_name", &shipping.last_name, "Last name");
    require(&mut errors, "address_line1", &shipping.address_line1, "Address");
    require(&mut errors, "city", &shipping.city, "City");
    require(&mut errors, "state", &shipping.state, "State / province");
    require(&mut errors, "postal_code", &shipping.postal_code, "Postal code");
    require(&mut errors, "country", &shipping.country, "Country");

    if shipping.email.trim().is_empty() {
        errors.insert("email", "Email is required");
    } else if !looks_like_email(&shipping.email) {
        errors.insert("email", "Enter a valid email address");
    }

    errors
}

/// Cardholder and billing checks for the payment step
pub fn validate_payment(payment: &PaymentDetails) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if payment.method == PaymentMethod::Check {
        return errors;
    }

    if payment.method == PaymentMethod::Card {
        require(&mut errors, "cardholder_name", &payment.cardholder_name, "Name on card");
    }

    if !payment.billing_same_as_shipping {
        require(&mut errors, "billing_address_line1", &payment.billing_address_line1, "Billing address");
        require(&mut errors, "billing_city", &payment.billing_city, "Billing city");
        require(&mut errors, "billing_postal_code", &payment.billing_postal_code, "Billing postal code");
        require(&mut errors, "billing_country", &payment.billing_country, "Billing country");
    }

    errors
}
