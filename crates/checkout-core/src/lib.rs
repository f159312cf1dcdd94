//! # checkout-core
//!
//! Pricing, selection reconciliation and step flow for a multi-step deal
//! checkout (shipping → add-ons/invoices → payment).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CheckoutStore                            │
//! │  ┌─────────────┐  ┌──────────────┐  ┌───────────────────┐   │
//! │  │    Deal     │──│  Reconciler  │──│  PricingEngine    │──▶ Quote
//! │  │ (immutable) │  │ (eligibility)│  │  (ordered policy) │   │
//! │  └─────────────┘  └──────────────┘  └───────────────────┘   │
//! │         ▲ update_section ──▶ StateObserver (persistence)     │
//! └─────────┼───────────────────────────────────────────────────┘
//!           │
//! ┌─────────┴──────────┐      ┌─────────────────┐
//! │ StepFlowController │─────▶│  AnalyticsSink  │
//! │ shipping→addons→pay│      │  (best-effort)  │
//! └────────────────────┘      └─────────────────┘
//! ```
//!
//! Nothing in this crate performs network I/O. Backends, payment gateways and
//! analytics transports live in `checkout-payments`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutStore, PricingEngine, Step};
//!
//! let mut store = CheckoutStore::initialize(deal, Step::Shipping, &saved);
//! store.toggle_add_on("warranty")?;
//!
//! let quote = store.quote(&PricingEngine::default());
//! quote.ensure_chargeable()?;
//! ```

pub mod analytics;
pub mod country;
pub mod error;
pub mod flow;
pub mod model;
pub mod persistence;
pub mod pricing;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod validation;

pub use analytics::{AnalyticsSink, CheckoutEvent, MemoryAnalytics, TracingAnalytics};
pub use error::{CheckoutError, Result};
pub use flow::{Clock, QueryStepLocation, Step, StepFlowController, StepTransition, SystemClock};
pub use model::{AddOn, AddOnType, Currency, Deal, DealId, DealType, Invoice, InvoiceProduct, PricingBehavior};
pub use persistence::{AddOnPersistence, MemorySelectionStore, SelectionStore};
pub use pricing::{FeePolicy, PaymentMethod, PricingEngine, Quote};
pub use reconcile::Reconciliation;
pub use registry::CallbackSlot;
pub use state::{CheckoutState, CheckoutStore, Section, SectionUpdate, StateObserver};
pub use validation::FieldErrors;
