//! Analytics Capture
//!
//! Checkout events handed to an external capture service. Emission is
//! best-effort: sinks never return errors and never block the caller.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::flow::Step;
use crate::model::DealId;

/// An event worth capturing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckoutEvent {
    /// Deal loaded and checkout form mounted
    CheckoutStarted {
        deal_id: DealId,
        deal_type: String,
        step: Step,
    },

    StepTransition {
        deal_id: DealId,
        from_step: Step,
        to_step: Step,
        time_spent_ms: i64,
    },

    /// Tab closed or navigated away mid-checkout
    DropOff {
        deal_id: DealId,
        step: Step,
        time_spent_ms: i64,
    },

    PaymentSubmitted {
        deal_id: DealId,
        amount: Decimal,
        method: String,
    },

    PaymentSucceeded {
        deal_id: DealId,
        order_id: String,
    },

    PaymentFailed {
        deal_id: DealId,
        message: String,
    },
}

impl CheckoutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckoutStarted { .. } => "checkout_started",
            Self::StepTransition { .. } => "checkout_step_transition",
            Self::DropOff { .. } => "checkout_drop_off",
            Self::PaymentSubmitted { .. } => "checkout_payment_submitted",
            Self::PaymentSucceeded { .. } => "checkout_payment_succeeded",
            Self::PaymentFailed { .. } => "checkout_payment_failed",
        }
    }

    pub fn deal_id(&self) -> &DealId {
        match self {
            Self::CheckoutStarted { deal_id, .. }
            | Self::StepTransition { deal_id, .. }
            | Self::DropOff { deal_id, .. }
            | Self::PaymentSubmitted { deal_id, .. }
            | Self::PaymentSucceeded { deal_id, .. }
            | Self::PaymentFailed { deal_id, .. } => deal_id,
        }
    }
}

/// A captured event with its timestamp
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapturedEvent {
    #[serde(flatten)]
    pub event: CheckoutEvent,
    pub captured_at: DateTime<Utc>,
}

impl CapturedEvent {
    pub fn now(event: CheckoutEvent) -> Self {
        Self {
            event,
            captured_at: Utc::now(),
        }
    }
}

/// Analytics collector (Strategy pattern)
pub trait AnalyticsSink: Send + Sync {
    /// Fire and forget
    fn capture(&self, event: CheckoutEvent);
}

/// Writes events to the tracing log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn capture(&self, event: CheckoutEvent) {
        tracing::info!(event = event.name(), deal_id = %event.deal_id(), payload = ?event, "Analytics event");
    }
}

/// In-memory analytics sink (for testing)
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    events: RwLock<Vec<CapturedEvent>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured events, oldest first
    pub fn events(&self) -> Vec<CheckoutEvent> {
        self.events
            .read()
            .map(|events| events.iter().map(|c| c.event.clone()).collect())
            .unwrap_or_default()
    }
}

impl AnalyticsSink for MemoryAnalytics {
    fn capture(&self, event: CheckoutEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(CapturedEvent::now(event));
        }
    }
}
