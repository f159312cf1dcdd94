//! Checkout Sessions
//!
//! One session per deal id. The slot outlives the session it holds: it owns
//! the load-once deal loader, the submission guard and the wallet button,
//! while the session itself (store and step controller) sits behind an async
//! mutex once the deal has loaded.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use checkout_core::persistence::load_add_on_selections;
use checkout_core::state::{PaymentPatch, SectionUpdate};
use checkout_core::{
    AddOnPersistence, CheckoutEvent, CheckoutState, CheckoutStore, Deal, DealId, FieldErrors, PaymentMethod,
    PricingEngine, QueryStepLocation, Quote, Reconciliation, Step, StepFlowController,
};
use checkout_payments::{
    Authorization, DealLoader, LoadOutcome, OrderConfirmation, PaymentError, PreparedOrder, SubmissionGuard,
    Submitter, WalletButton, WalletDisplay, WalletTokenHandler,
};

use crate::state::AppState;

/// A loaded checkout
#[derive(Debug)]
pub struct CheckoutSession {
    pub id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub store: CheckoutStore,
    pub flow: StepFlowController<QueryStepLocation>,
}

impl CheckoutSession {
    fn start(state: &AppState, deal: Deal, query: &str) -> Self {
        let deal_id = deal.id.clone();
        let flow = StepFlowController::from_query(deal_id.clone(), query, state.clock.clone(), state.analytics.clone());

        let persisted = load_add_on_selections(state.selections.as_ref(), &deal_id);
        let mut store = CheckoutStore::initialize(deal, flow.current(), &persisted);
        store.observe(Box::new(AddOnPersistence::new(deal_id.clone(), state.selections.clone())));

        state.analytics.capture(CheckoutEvent::CheckoutStarted {
            deal_id,
            deal_type: store.deal().deal_type.as_str().to_string(),
            step: flow.current(),
        });

        Self {
            id: uuid::Uuid::new_v4(),
            started_at: Utc::now(),
            store,
            flow,
        }
    }

    /// Move to a step, keeping the store's copy in sync
    pub fn go_to(&mut self, step: Step) {
        self.flow.transition(step);
        self.store.set_current_step(step);
    }

    /// Move to a step by name; unknown names change nothing
    pub fn go_to_named(&mut self, name: &str) -> checkout_core::Result<()> {
        let transition = self.flow.go_to_step(name)?;
        self.store.set_current_step(transition.to_step);
        Ok(())
    }

    pub fn view(&self, engine: &PricingEngine, wallet: &WalletButton, submitting: bool) -> SessionView {
        SessionView {
            session_id: self.id,
            started_at: self.started_at,
            deal: self.store.deal().clone(),
            step: self.flow.current(),
            query: self.flow.location().query(),
            state: self.store.state().clone(),
            errors: self.store.errors().clone(),
            reconciliation: self.store.reconciliation(),
            quote: self.store.quote(engine),
            wallet: wallet.display(),
            submitting,
        }
    }
}

/// Everything the checkout page renders
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub deal: Deal,
    pub step: Step,
    /// Page query string with `step` rewritten
    pub query: String,
    pub state: CheckoutState,
    pub errors: FieldErrors,
    pub reconciliation: Reconciliation,
    pub quote: Quote,
    pub wallet: WalletDisplay,
    pub submitting: bool,
}

/// Per-deal slot
#[derive(Debug)]
pub struct SessionSlot {
    pub deal_id: DealId,
    loader: DealLoader,
    session: OnceCell<Arc<Mutex<CheckoutSession>>>,
    pub guard: SubmissionGuard,
    pub wallet: WalletButton,
}

impl SessionSlot {
    fn new(deal_id: DealId) -> Self {
        Self {
            deal_id,
            loader: DealLoader::new(),
            session: OnceCell::new(),
            guard: SubmissionGuard::new(),
            wallet: WalletButton::new(),
        }
    }

    /// The session, if its deal has loaded
    pub fn session(&self) -> Option<Arc<Mutex<CheckoutSession>>> {
        self.session.get().cloned()
    }

    /// Load the deal on first use; a failed load is terminal for the slot
    pub async fn open(&self, state: &AppState, query: &str) -> Result<Arc<Mutex<CheckoutSession>>, PaymentError> {
        let session = self
            .session
            .get_or_try_init(|| async move {
                match self.loader.load(state.backend.as_ref(), &self.deal_id).await {
                    LoadOutcome::Loaded(deal) => Ok(Arc::new(Mutex::new(CheckoutSession::start(state, deal, query)))),
                    LoadOutcome::NotFound(e) => Err(e),
                    LoadOutcome::Skipped | LoadOutcome::Stale => Err(PaymentError::DealNotFound(self.deal_id.to_string())),
                }
            })
            .await?
            .clone();

        let locked = session.lock().await;
        self.refresh_wallet(state, &session, &locked);
        drop(locked);

        Ok(session)
    }

    /// Push the live total to the wallet button and register a handler
    /// bound to this session
    pub fn refresh_wallet(&self, state: &AppState, session: &Arc<Mutex<CheckoutSession>>, locked: &CheckoutSession) {
        self.wallet.update_total(&locked.store.quote(&state.engine));
        self.wallet.register(Arc::new(WalletCheckout {
            session: session.clone(),
            guard: self.guard.clone(),
            submitter: state.submitter.clone(),
            engine: state.engine.clone(),
        }));
    }

    pub fn unmount(&self) {
        self.loader.unmount();
    }
}

/// Wallet token handler for one session
struct WalletCheckout {
    session: Arc<Mutex<CheckoutSession>>,
    guard: SubmissionGuard,
    submitter: Submitter,
    engine: Arc<PricingEngine>,
}

#[async_trait]
impl WalletTokenHandler for WalletCheckout {
    async fn on_token(&self, token: String) -> checkout_payments::Result<OrderConfirmation> {
        let held = self.guard.try_acquire()?;
        let order = {
            let mut session = self.session.lock().await;
            session.store.update_section(SectionUpdate::Payment(PaymentPatch {
                method: Some(PaymentMethod::Wallet),
                ..PaymentPatch::default()
            }))?;
            PreparedOrder::from_store(&mut session.store, &self.engine)?
        };
        self.submitter.submit(held, order, Authorization::WalletToken(token)).await
    }
}

/// Open sessions by deal id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for a deal, created on first use
    pub fn slot(&self, deal_id: &DealId) -> Arc<SessionSlot> {
        if let Some(slot) = self.get(deal_id) {
            return slot;
        }
        match self.slots.write() {
            Ok(mut slots) => slots
                .entry(deal_id.to_string())
                .or_insert_with(|| Arc::new(SessionSlot::new(deal_id.clone())))
                .clone(),
            Err(_) => Arc::new(SessionSlot::new(deal_id.clone())),
        }
    }

    pub fn get(&self, deal_id: &DealId) -> Option<Arc<SessionSlot>> {
        self.slots.read().ok()?.get(deal_id.as_str()).cloned()
    }

    /// Forget a deal's session; late responses for it are dropped
    pub fn remove(&self, deal_id: &DealId) {
        let removed = self.slots.write().ok().and_then(|mut slots| slots.remove(deal_id.as_str()));
        if let Some(slot) = removed {
            slot.unmount();
            tracing::debug!(deal_id = %deal_id, "Checkout session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }
}
