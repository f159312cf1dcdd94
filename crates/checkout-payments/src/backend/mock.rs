//! In-memory backend for tests and local development

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use checkout_core::{AddOn, AddOnType, Deal, DealId, DealType, Invoice, InvoiceProduct, PricingBehavior};

use super::{AddressRequest, AddressResponse, CheckoutBackend, OrderDetails, PaymentRequest, PaymentResponse};
use crate::error::{PaymentError, Result};

/// A request the mock received
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    FetchDeal(String),
    SaveAddress(AddressRequest),
    Payment(PaymentRequest),
    ChequePayment(OrderDetails),
}

/// Mock backend
#[derive(Debug, Default)]
pub struct MockBackend {
    deals: RwLock<HashMap<String, Deal>>,
    calls: RwLock<Vec<BackendCall>>,
    payment_failure: RwLock<Option<String>>,
    omit_order_ids: AtomicBool,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded with [`demo_deal`]
    pub fn with_demo_deal() -> Self {
        let backend = Self::new();
        backend.insert_deal(demo_deal());
        backend
    }

    /// Delay every call, to exercise in-flight behaviour
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_deal(&self, deal: Deal) {
        if let Ok(mut deals) = self.deals.write() {
            deals.insert(deal.id.to_string(), deal);
        }
    }

    /// Refuse subsequent payments with a structured error carrying `message`
    pub fn fail_payments_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.payment_failure.write() {
            *failure = Some(message.into());
        }
    }

    /// Confirm payments without an order id, as some backends do
    pub fn omit_order_ids(&self) {
        self.omit_order_ids.store(true, Ordering::Relaxed);
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().map(|calls| calls.clone()).unwrap_or_default()
    }

    async fn record(&self, call: BackendCall) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Ok(mut calls) = self.calls.write() {
            calls.push(call);
        }
    }

    fn payment_outcome(&self) -> Result<PaymentResponse> {
        let failure = self.payment_failure.read().ok().and_then(|f| f.clone());
        match failure {
            Some(message) => Err(PaymentError::Backend {
                status: 402,
                message: Some(message),
                code: Some("payment_failed".into()),
            }),
            None => Ok(PaymentResponse {
                success: true,
                order_id: (!self.omit_order_ids.load(Ordering::Relaxed))
                    .then(|| format!("ord_{}", uuid::Uuid::new_v4().simple())),
                message: None,
            }),
        }
    }
}

#[async_trait]
impl CheckoutBackend for MockBackend {
    async fn fetch_deal(&self, deal_id: &DealId) -> Result<Deal> {
        self.record(BackendCall::FetchDeal(deal_id.to_string())).await;
        self.deals
            .read()
            .ok()
            .and_then(|deals| deals.get(deal_id.as_str()).cloned())
            .ok_or_else(|| PaymentError::DealNotFound(deal_id.to_string()))
    }

    async fn save_address(&self, request: &AddressRequest) -> Result<AddressResponse> {
        self.record(BackendCall::SaveAddress(request.clone())).await;
        Ok(AddressResponse {
            success: true,
            message: None,
        })
    }

    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentResponse> {
        self.record(BackendCall::Payment(request.clone())).await;
        self.payment_outcome()
    }

    async fn submit_cheque_payment(&self, order: &OrderDetails) -> Result<PaymentResponse> {
        self.record(BackendCall::ChequePayment(order.clone())).await;
        self.payment_outcome()
    }
}

/// A subscription deal with one owned tier, one upgrade, hardware and an
/// open invoice
pub fn demo_deal() -> Deal {
    let mut deal = Deal::new("demo", DealType::Subscription, dec!(0));
    deal.name = Some("Demo Business Plan".into());
    deal.monthly_subscription_price = dec!(49);
    deal.has_active_subscription = true;
    deal.active_subscription_amount = Some(dec!(49));
    deal.contact_first_name = Some("Ada".into());
    deal.contact_last_name = Some("Lovelace".into());
    deal.contact_email = Some("ada@example.com".into());
    deal.mailing_address_line1 = Some("1 Analytical Way".into());
    deal.mailing_address_city = Some("Austin".into());
    deal.mailing_address_state = Some("TX".into());
    deal.mailing_address_postal_code = Some("73301".into());
    deal.mailing_address_country = Some("United States".into());

    let add_on = |id: &str, addon_type, amount, pricing_behavior, name: &str| AddOn {
        id: id.into(),
        addon_type,
        amount,
        pricing_behavior,
        product_name: Some(name.into()),
    };
    deal.add_ons = vec![
        add_on("plan_business", AddOnType::Subscription, dec!(49), PricingBehavior::Replace, "Business"),
        add_on("plan_enterprise", AddOnType::Subscription, dec!(99), PricingBehavior::Replace, "Enterprise"),
        add_on("router", AddOnType::OneTime, dec!(120), PricingBehavior::Add, "Router"),
    ];
    deal.invoices = vec![Invoice {
        id: "inv_1001".into(),
        status: "Open".into(),
        amount: dec!(49),
        due_date: Some("2026-11-01".into()),
        products: vec![InvoiceProduct {
            name: "Business (monthly)".into(),
            quantity: 1,
            price: dec!(49),
        }],
    }];
    deal
}
