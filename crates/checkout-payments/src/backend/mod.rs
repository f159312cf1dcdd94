//! Backend REST API
//!
//! The checkout consumes four endpoints:
//!
//! ```text
//! GET  {base}/deals/{deal_id}              → Deal
//! POST {base}/payments/address             → { success, message? }
//! POST {base}/payments                     → { success, order_id? } | { message, error, status }
//! POST {base}/payments/cheque-payments     → same, without token and amount
//! ```

mod http;
mod mock;

pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend, demo_deal};

use async_trait::async_trait;
use checkout_core::state::{PaymentDetails, ShippingDetails};
use checkout_core::{Deal, DealId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Backend operations used by checkout
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    /// Load a deal; any failure is terminal for the session
    async fn fetch_deal(&self, deal_id: &DealId) -> Result<Deal>;

    async fn save_address(&self, request: &AddressRequest) -> Result<AddressResponse>;

    /// Charge a tokenized card or wallet payment
    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse>;

    /// Record a cheque order; nothing is charged online
    async fn submit_cheque_payment(&self, order: &OrderDetails) -> Result<PaymentResponse>;
}

/// Shipping address save request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    /// Deal id
    pub uuid: String,

    #[serde(flatten)]
    pub shipping: ShippingDetails,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResponse {
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,
}

/// Order fields shared by card and cheque submissions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    /// Deal id, or a fresh v4 uuid when the deal carries none
    pub uuid: String,

    pub shipping_first_name: String,
    pub shipping_last_name: String,
    pub shipping_email: String,
    pub shipping_phone: String,
    pub shipping_address_line1: String,
    pub shipping_address_line2: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,

    pub billing_name: String,
    pub billing_address_line1: String,
    pub billing_address_line2: String,
    pub billing_city: String,
    pub billing_state: String,
    pub billing_postal_code: String,
    pub billing_country: String,

    /// Selected add-on ids
    pub add_ons: Vec<String>,

    /// Selected, unpaid invoice ids
    pub invoice_ids: Vec<String>,
}

impl OrderDetails {
    /// Assemble from form state; billing copies shipping when the customer
    /// ticked "same as shipping"
    pub fn build(
        deal_id: &DealId,
        shipping: &ShippingDetails,
        payment: &PaymentDetails,
        add_ons: Vec<String>,
        invoice_ids: Vec<String>,
    ) -> Self {
        let uuid = if deal_id.as_str().trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            deal_id.to_string()
        };

        let billing_name = if payment.cardholder_name.trim().is_empty() {
            shipping.full_name()
        } else {
            payment.cardholder_name.trim().to_string()
        };

        let (line1, line2, city, state, postal_code, country) = if payment.billing_same_as_shipping {
            (
                &shipping.address_line1,
                &shipping.address_line2,
                &shipping.city,
                &shipping.state,
                &shipping.postal_code,
                &shipping.country,
            )
        } else {
            (
                &payment.billing_address_line1,
                &payment.billing_address_line2,
                &payment.billing_city,
                &payment.billing_state,
                &payment.billing_postal_code,
                &payment.billing_country,
            )
        };

        Self {
            uuid,
            shipping_first_name: shipping.first_name.clone(),
            shipping_last_name: shipping.last_name.clone(),
            shipping_email: shipping.email.clone(),
            shipping_phone: shipping.phone.clone(),
            shipping_address_line1: shipping.address_line1.clone(),
            shipping_address_line2: shipping.address_line2.clone(),
            shipping_city: shipping.city.clone(),
            shipping_state: shipping.state.clone(),
            shipping_postal_code: shipping.postal_code.clone(),
            shipping_country: shipping.country.clone(),
            billing_name,
            billing_address_line1: line1.clone(),
            billing_address_line2: line2.clone(),
            billing_city: city.clone(),
            billing_state: state.clone(),
            billing_postal_code: postal_code.clone(),
            billing_country: country.clone(),
            add_ons,
            invoice_ids,
        }
    }
}

/// Tokenized payment submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(flatten)]
    pub order: OrderDetails,

    /// Payment method id returned by the gateway
    pub payment_token: String,

    /// Total including the processing fee, in major units
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// ISO currency code
    pub currency: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,

    #[serde(default)]
    pub order_id: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl PaymentResponse {
    /// The confirmed order id, or the backend's refusal as an error.
    ///
    /// `order_id` is optional on success; the order's own uuid stands in
    /// for it so a completed charge is never reported as a failure.
    pub fn into_order_id(self, fallback: &str) -> Result<String> {
        match (self.success, self.order_id) {
            (true, Some(order_id)) if !order_id.trim().is_empty() => Ok(order_id),
            (true, _) => Ok(fallback.to_string()),
            (false, _) => Err(PaymentError::Backend {
                status: 200,
                message: self.message.filter(|m| !m.trim().is_empty()),
                code: None,
            }),
        }
    }
}

/// Structured error payload returned by the backend on failure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub status: Option<u16>,
}

/// Convert a failed response into an error, keeping the payload's message
/// when it has one
pub fn backend_error(status: u16, body: &str) -> PaymentError {
    let parsed: BackendErrorBody = serde_json::from_str(body).unwrap_or_default();
    PaymentError::Backend {
        status: parsed.status.unwrap_or(status),
        message: parsed.message.filter(|m| !m.trim().is_empty()),
        code: parsed.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::PaymentMethod;
    use rust_decimal_macros::dec;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
            address_line1: "1 Main St".into(),
            address_line2: String::new(),
            city: "Austin".into(),
            state: "TX".into(),
            postal_code: "73301".into(),
            country: "US".into(),
        }
    }

    #[test]
    fn test_billing_copies_shipping() {
        let payment = PaymentDetails::default();
        let order = OrderDetails::build(&DealId::from_string("d1"), &shipping(), &payment, vec![], vec![]);

        assert_eq!(order.uuid, "d1");
        assert_eq!(order.billing_name, "Ada Lovelace");
        assert_eq!(order.billing_city, "Austin");
        assert_eq!(order.billing_country, "US");
    }

    #[test]
    fn test_separate_billing_address() {
        let payment = PaymentDetails {
            method: PaymentMethod::Card,
            cardholder_name: "A. Lovelace".into(),
            billing_same_as_shipping: false,
            billing_city: "Toronto".into(),
            billing_country: "Canada".into(),
            ..PaymentDetails::default()
        };
        let order = OrderDetails::build(&DealId::from_string(""), &shipping(), &payment, vec![], vec![]);

        assert_eq!(order.uuid.len(), 36);
        assert_eq!(order.billing_name, "A. Lovelace");
        assert_eq!(order.billing_city, "Toronto");
        assert_eq!(order.shipping_city, "Austin");
    }

    #[test]
    fn test_payment_request_wire_format() {
        let request = PaymentRequest {
            order: OrderDetails {
                uuid: "d1".into(),
                add_ons: vec!["a1".into()],
                ..OrderDetails::default()
            },
            payment_token: "pm_123".into(),
            amount: dec!(51.45),
            currency: "USD".into(),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["uuid"], "d1");
        assert_eq!(json["payment_token"], "pm_123");
        assert_eq!(json["amount"], serde_json::json!(51.45));
        assert_eq!(json["add_ons"], serde_json::json!(["a1"]));
    }

    #[test]
    fn test_backend_error_parsing() {
        let err = backend_error(400, r#"{"message": "Card declined", "error": "card_declined", "status": 402}"#);
        match err {
            PaymentError::Backend { status, message, code } => {
                assert_eq!(status, 402);
                assert_eq!(message.as_deref(), Some("Card declined"));
                assert_eq!(code.as_deref(), Some("card_declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = backend_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.user_message(), crate::error::GENERIC_FAILURE);
    }

    #[test]
    fn test_unsuccessful_response_is_an_error() {
        let refused = PaymentResponse {
            success: false,
            order_id: None,
            message: Some("Invoice already paid".into()),
        };
        let err = refused.into_order_id("d1").unwrap_err();
        assert_eq!(err.user_message(), "Invoice already paid");

        let ok = PaymentResponse {
            success: true,
            order_id: Some("ord_1".into()),
            message: None,
        };
        assert_eq!(ok.into_order_id("d1").unwrap(), "ord_1");
    }

    #[test]
    fn test_success_without_order_id_uses_order_uuid() {
        let response = PaymentResponse {
            success: true,
            order_id: None,
            message: None,
        };
        assert_eq!(response.into_order_id("d1").unwrap(), "d1");

        let blank = PaymentResponse {
            success: true,
            order_id: Some(String::new()),
            message: None,
        };
        assert_eq!(blank.into_order_id("d1").unwrap(), "d1");
    }
}
