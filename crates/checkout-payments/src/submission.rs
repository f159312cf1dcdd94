//! Payment Submission
//!
//! ```text
//! acquire guard ─▶ PreparedOrder (validate, zero-total guard)
//!                      │
//!          ┌───────────┼──────────────┐
//!        check        card          wallet
//!          │           │ tokenize      │ token from button
//!          ▼           ▼               ▼
//!   cheque-payments ◀─ payments ◀──────┘
//! ```
//!
//! Everything that can be refused locally is refused before any network call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use checkout_core::{AnalyticsSink, CheckoutEvent, CheckoutStore, DealId, PaymentMethod, PricingEngine, Quote, Step};

use crate::backend::{CheckoutBackend, OrderDetails, PaymentRequest};
use crate::error::{PaymentError, Result};
use crate::gateway::{CardCapture, Cardholder, PaymentGateway};

/// Re-entrancy guard: at most one submission per checkout at a time
#[derive(Clone, Debug, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<AtomicBool>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a submission as running; refused while another one is
    pub fn try_acquire(&self) -> Result<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PaymentError::SubmissionInFlight)?;
        Ok(InFlight {
            flag: self.in_flight.clone(),
        })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held for the duration of one submission; releases the guard on drop
#[derive(Debug)]
pub struct InFlight {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Everything needed to submit, captured from the store
#[derive(Clone, Debug)]
pub struct PreparedOrder {
    pub deal_id: DealId,
    pub method: PaymentMethod,
    pub quote: Quote,
    pub cardholder: Cardholder,
    pub details: OrderDetails,
}

impl PreparedOrder {
    /// Validate the shipping and payment steps and refuse a zero total
    pub fn from_store(store: &mut CheckoutStore, engine: &PricingEngine) -> Result<Self> {
        store.validate_step(Step::Shipping)?;
        store.validate_step(Step::Payment)?;

        let quote = store.quote(engine);
        quote.ensure_chargeable()?;

        let state = store.state();
        let deal_id = store.deal().id.clone();
        let reconciliation = store.reconciliation();
        let details = OrderDetails::build(
            &deal_id,
            &state.shipping,
            &state.payment,
            reconciliation.chargeable_add_on_ids,
            reconciliation.chargeable_invoice_ids,
        );

        Ok(Self {
            cardholder: Cardholder {
                name: details.billing_name.clone(),
                email: state.shipping.email.clone(),
            },
            method: state.payment.method,
            deal_id,
            quote,
            details,
        })
    }
}

/// A confirmed order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub deal_id: DealId,
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// How the customer authorised the charge
#[derive(Clone, Debug)]
pub enum Authorization {
    /// Card form capture, tokenized through the gateway
    Card(CardCapture),

    /// Token delivered by the wallet button
    WalletToken(String),

    /// Pay by cheque; nothing to authorise online
    Cheque,
}

/// Orchestrates submission against the backend
#[derive(Clone)]
pub struct Submitter {
    backend: Arc<dyn CheckoutBackend>,
    gateway: Arc<dyn PaymentGateway>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl Submitter {
    pub fn new(
        backend: Arc<dyn CheckoutBackend>,
        gateway: Arc<dyn PaymentGateway>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            backend,
            gateway,
            analytics,
        }
    }

    pub fn backend(&self) -> &Arc<dyn CheckoutBackend> {
        &self.backend
    }

    /// Submit a prepared order; `_in_flight` keeps the guard held until done
    pub async fn submit(
        &self,
        _in_flight: InFlight,
        order: PreparedOrder,
        authorization: Authorization,
    ) -> Result<OrderConfirmation> {
        self.analytics.capture(CheckoutEvent::PaymentSubmitted {
            deal_id: order.deal_id.clone(),
            amount: order.quote.total,
            method: order.method.as_str().to_string(),
        });

        let result = self.dispatch(&order, authorization).await;

        match &result {
            Ok(order_id) => {
                tracing::info!(deal_id = %order.deal_id, order_id = %order_id, "Payment succeeded");
                self.analytics.capture(CheckoutEvent::PaymentSucceeded {
                    deal_id: order.deal_id.clone(),
                    order_id: order_id.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(deal_id = %order.deal_id, error = %e, "Payment failed");
                self.analytics.capture(CheckoutEvent::PaymentFailed {
                    deal_id: order.deal_id.clone(),
                    message: e.user_message(),
                });
            }
        }

        Ok(OrderConfirmation {
            order_id: result?,
            deal_id: order.deal_id,
            method: order.method,
            amount: order.quote.total,
        })
    }

    async fn dispatch(&self, order: &PreparedOrder, authorization: Authorization) -> Result<String> {
        let fallback = order.details.uuid.as_str();
        let token = match (order.method, authorization) {
            (PaymentMethod::Check, _) => {
                return self.backend.submit_cheque_payment(&order.details).await?.into_order_id(fallback);
            }
            (method, Authorization::Cheque) => return Err(PaymentError::MethodMismatch(method.as_str().to_string())),
            (_, Authorization::Card(capture)) => self.gateway.tokenize(&capture, &order.cardholder).await?,
            (_, Authorization::WalletToken(token)) => token,
        };

        let request = PaymentRequest {
            order: order.details.clone(),
            payment_token: token,
            amount: order.quote.total,
            currency: order.quote.currency.code().to_string(),
        };
        self.backend.submit_payment(&request).await?.into_order_id(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MockBackend, demo_deal};
    use crate::gateway::ClientSideGateway;
    use checkout_core::MemoryAnalytics;
    use checkout_core::state::{PaymentPatch, SectionUpdate};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn store() -> CheckoutStore {
        let mut store = CheckoutStore::initialize(demo_deal(), Step::Payment, &BTreeMap::new());
        store
            .update_section(SectionUpdate::Payment(PaymentPatch {
                cardholder_name: Some("Ada Lovelace".into()),
                ..PaymentPatch::default()
            }))
            .unwrap();
        store
    }

    fn submitter(backend: Arc<MockBackend>, analytics: Arc<MemoryAnalytics>) -> Submitter {
        Submitter::new(backend, Arc::new(ClientSideGateway), analytics)
    }

    fn card(id: &str) -> Authorization {
        Authorization::Card(CardCapture::Token {
            payment_method_id: id.into(),
        })
    }

    #[test]
    fn test_guard_is_reentrancy_safe() {
        let guard = SubmissionGuard::new();
        let held = guard.try_acquire().unwrap();
        assert!(matches!(guard.try_acquire(), Err(PaymentError::SubmissionInFlight)));

        drop(held);
        assert!(!guard.is_in_flight());
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn test_zero_total_refused_locally() {
        let mut store = store();
        store
            .update_section(SectionUpdate::Invoices(BTreeMap::from([("inv_1001".to_string(), false)])))
            .unwrap();

        let err = PreparedOrder::from_store(&mut store, &PricingEngine::default()).unwrap_err();
        assert!(matches!(err, PaymentError::Core(checkout_core::CheckoutError::ZeroTotal)));
    }

    #[tokio::test]
    async fn test_card_payment_submits_total() {
        let backend = Arc::new(MockBackend::with_demo_deal());
        let analytics = Arc::new(MemoryAnalytics::new());
        let mut store = store();
        let order = PreparedOrder::from_store(&mut store, &PricingEngine::default()).unwrap();

        let guard = SubmissionGuard::new();
        let confirmation = submitter(backend.clone(), analytics.clone())
            .submit(guard.try_acquire().unwrap(), order, card("pm_1"))
            .await
            .unwrap();

        // open invoice 49.00 plus 2.9% US card fee
        assert_eq!(confirmation.amount, dec!(50.42));
        assert!(!guard.is_in_flight());

        match &backend.calls()[0] {
            BackendCall::Payment(request) => {
                assert_eq!(request.payment_token, "pm_1");
                assert_eq!(request.amount, dec!(50.42));
                assert_eq!(request.order.invoice_ids, vec!["inv_1001".to_string()]);
                assert_eq!(request.order.billing_name, "Ada Lovelace");
            }
            other => panic!("unexpected call: {other:?}"),
        }

        let names: Vec<_> = analytics.events().iter().map(CheckoutEvent::name).collect();
        assert_eq!(names, vec!["checkout_payment_submitted", "checkout_payment_succeeded"]);
    }

    #[tokio::test]
    async fn test_cheque_skips_tokenization() {
        let backend = Arc::new(MockBackend::with_demo_deal());
        let mut store = store();
        store
            .update_section(SectionUpdate::Payment(PaymentPatch {
                method: Some(PaymentMethod::Check),
                ..PaymentPatch::default()
            }))
            .unwrap();
        let order = PreparedOrder::from_store(&mut store, &PricingEngine::default()).unwrap();
        assert_eq!(order.quote.total, dec!(49));

        submitter(backend.clone(), Arc::new(MemoryAnalytics::new()))
            .submit(SubmissionGuard::new().try_acquire().unwrap(), order, Authorization::Cheque)
            .await
            .unwrap();

        assert!(matches!(backend.calls()[0], BackendCall::ChequePayment(_)));
    }

    #[tokio::test]
    async fn test_success_without_order_id_confirms_with_order_uuid() {
        let backend = Arc::new(MockBackend::with_demo_deal());
        backend.omit_order_ids();
        let analytics = Arc::new(MemoryAnalytics::new());
        let submitter = submitter(backend.clone(), analytics.clone());

        let order = PreparedOrder::from_store(&mut store(), &PricingEngine::default()).unwrap();
        let confirmation = submitter
            .submit(SubmissionGuard::new().try_acquire().unwrap(), order, card("pm_1"))
            .await
            .unwrap();
        assert_eq!(confirmation.order_id, "demo");
        assert_eq!(confirmation.amount, dec!(50.42));

        let mut cheque_store = store();
        cheque_store
            .update_section(SectionUpdate::Payment(PaymentPatch {
                method: Some(PaymentMethod::Check),
                ..PaymentPatch::default()
            }))
            .unwrap();
        let order = PreparedOrder::from_store(&mut cheque_store, &PricingEngine::default()).unwrap();
        let confirmation = submitter
            .submit(SubmissionGuard::new().try_acquire().unwrap(), order, Authorization::Cheque)
            .await
            .unwrap();
        assert_eq!(confirmation.order_id, "demo");
        assert_eq!(confirmation.method, PaymentMethod::Check);

        assert!(
            analytics
                .events()
                .iter()
                .all(|e| !matches!(e, CheckoutEvent::PaymentFailed { .. }))
        );
    }

    #[tokio::test]
    async fn test_cheque_authorization_needs_cheque_method() {
        let backend = Arc::new(MockBackend::with_demo_deal());
        let order = PreparedOrder::from_store(&mut store(), &PricingEngine::default()).unwrap();
        assert_eq!(order.method, PaymentMethod::Card);

        let err = submitter(backend.clone(), Arc::new(MemoryAnalytics::new()))
            .submit(SubmissionGuard::new().try_acquire().unwrap(), order, Authorization::Cheque)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::MethodMismatch(ref method) if method == "card"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_message_surfaces() {
        let backend = Arc::new(MockBackend::with_demo_deal());
        backend.fail_payments_with("Your card was declined.");
        let analytics = Arc::new(MemoryAnalytics::new());
        let order = PreparedOrder::from_store(&mut store(), &PricingEngine::default()).unwrap();

        let err = submitter(backend, analytics.clone())
            .submit(SubmissionGuard::new().try_acquire().unwrap(), order, card("pm_1"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Your card was declined.");
        assert!(matches!(
            analytics.events().last(),
            Some(CheckoutEvent::PaymentFailed { message, .. }) if message == "Your card was declined."
        ));
    }

    #[tokio::test]
    async fn test_second_submission_refused_while_first_in_flight() {
        let backend = Arc::new(MockBackend::with_demo_deal().with_latency(Duration::from_millis(50)));
        let guard = SubmissionGuard::new();
        let order = PreparedOrder::from_store(&mut store(), &PricingEngine::default()).unwrap();
        let submitter = submitter(backend.clone(), Arc::new(MemoryAnalytics::new()));

        let first = {
            let (submitter, order) = (submitter.clone(), order.clone());
            let held = guard.try_acquire().unwrap();
            tokio::spawn(async move { submitter.submit(held, order, card("pm_1")).await })
        };

        assert!(matches!(guard.try_acquire(), Err(PaymentError::SubmissionInFlight)));
        assert!(first.await.unwrap().is_ok());
        assert!(!guard.is_in_flight());
        assert_eq!(backend.calls().len(), 1);
    }
}
