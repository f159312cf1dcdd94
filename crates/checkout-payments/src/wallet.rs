//! Wallet Payment Button
//!
//! The wallet button (Apple Pay / Google Pay) lives longer than any one
//! render of the payment step. It shows the live total in minor units and,
//! when the customer authorises, delivers a token to whichever handler was
//! registered last.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;

use checkout_core::{CallbackSlot, Currency, Quote};

use crate::error::{PaymentError, Result};
use crate::submission::OrderConfirmation;

/// Receives wallet tokens
#[async_trait]
pub trait WalletTokenHandler: Send + Sync {
    async fn on_token(&self, token: String) -> Result<OrderConfirmation>;
}

/// What the button renders
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletDisplay {
    /// Total in minor units (cents)
    pub amount: i64,
    pub currency: &'static str,
    pub country: &'static str,
}

/// Wallet button state
#[derive(Debug, Default)]
pub struct WalletButton {
    amount_minor: AtomicI64,
    currency: RwLock<Currency>,
    handler: CallbackSlot<dyn WalletTokenHandler>,
}

impl WalletButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the latest quote
    pub fn update_total(&self, quote: &Quote) {
        self.amount_minor.store(quote.minor_units(), Ordering::Release);
        if let Ok(mut currency) = self.currency.write() {
            *currency = quote.currency;
        }
    }

    pub fn display(&self) -> WalletDisplay {
        let currency = self.currency.read().map(|c| *c).unwrap_or_default();
        WalletDisplay {
            amount: self.amount_minor.load(Ordering::Acquire),
            currency: currency.processor_code(),
            country: match currency {
                Currency::Usd => "US",
                Currency::Cad => "CA",
            },
        }
    }

    /// Replace the live handler
    pub fn register(&self, handler: Arc<dyn WalletTokenHandler>) {
        self.handler.set(handler);
    }

    pub fn is_ready(&self) -> bool {
        self.handler.is_registered() && self.amount_minor.load(Ordering::Acquire) > 0
    }

    /// Hand a token to the handler registered at this moment
    pub async fn deliver(&self, token: String) -> Result<OrderConfirmation> {
        let handler = self
            .handler
            .get()
            .ok_or_else(|| PaymentError::Gateway("Wallet payment is not available right now.".into()))?;
        handler.on_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{DealId, PaymentMethod};
    use rust_decimal_macros::dec;

    struct Fixed(&'static str);

    #[async_trait]
    impl WalletTokenHandler for Fixed {
        async fn on_token(&self, token: String) -> Result<OrderConfirmation> {
            Ok(OrderConfirmation {
                order_id: format!("{}:{token}", self.0),
                deal_id: DealId::from_string("d1"),
                method: PaymentMethod::Wallet,
                amount: dec!(1),
            })
        }
    }

    fn quote(total: rust_decimal::Decimal) -> Quote {
        Quote {
            base: total,
            add_on_adjustment: dec!(0),
            subtotal: total,
            fee_rate: dec!(0),
            processing_fee: dec!(0),
            total,
            currency: Currency::Cad,
        }
    }

    #[test]
    fn test_total_in_minor_units() {
        let button = WalletButton::new();
        button.update_total(&quote(dec!(51.45)));

        let display = button.display();
        assert_eq!(display.amount, 5145);
        assert_eq!(display.country, "CA");
        assert!(!button.is_ready());
    }

    #[tokio::test]
    async fn test_latest_handler_receives_token() {
        let button = WalletButton::new();
        assert!(button.deliver("tok".into()).await.is_err());

        button.register(Arc::new(Fixed("first")));
        button.register(Arc::new(Fixed("second")));
        button.update_total(&quote(dec!(10)));
        assert!(button.is_ready());

        let confirmation = button.deliver("tok_1".into()).await.unwrap();
        assert_eq!(confirmation.order_id, "second:tok_1");
    }
}
