//! Application State

use std::sync::Arc;

use checkout_core::{AnalyticsSink, Clock, PricingEngine, SelectionStore};
use checkout_payments::{CheckoutBackend, Submitter};

use crate::session::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Backend REST client (HTTP, or the in-memory mock in development)
    pub backend: Arc<dyn CheckoutBackend>,

    pub submitter: Submitter,

    pub engine: Arc<PricingEngine>,

    pub analytics: Arc<dyn AnalyticsSink>,

    pub clock: Arc<dyn Clock>,

    /// Persisted add-on selections, one entry per deal
    pub selections: Arc<dyn SelectionStore>,

    /// Open checkout sessions by deal id
    pub sessions: Arc<SessionRegistry>,

    /// Whether `backend` is the in-memory mock
    pub mock_backend: bool,
}
