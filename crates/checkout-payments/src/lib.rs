//! # checkout-payments
//!
//! The I/O edge of deal checkout: the backend REST client, the payment
//! gateway boundary, deal loading and payment submission.
//!
//! ## Payment Flow
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌────────────────┐   ┌─────────────┐
//! │  DealLoader  │──▶│ CheckoutStore  │──▶│ PreparedOrder  │──▶│  Submitter  │
//! │ (load once)  │   │ (checkout-core)│   │ (guards, quote)│   │ (backend)   │
//! └──────────────┘   └────────────────┘   └────────────────┘   └─────────────┘
//!                                                                 ▲        ▲
//!                                        PaymentGateway (card) ───┘        │
//!                                        WalletButton (token) ─────────────┘
//! ```
//!
//! Card details never reach this crate. The browser tokenizes the card and
//! the [`PaymentGateway`] turns the capture result into a payment method id
//! or a display-safe error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{Authorization, HttpBackend, PreparedOrder, SubmissionGuard, Submitter};
//!
//! let backend = Arc::new(HttpBackend::from_env()?);
//! let submitter = Submitter::new(backend, Arc::new(ClientSideGateway), analytics);
//!
//! let held = guard.try_acquire()?;
//! let order = PreparedOrder::from_store(&mut store, &engine)?;
//! let confirmation = submitter.submit(held, order, Authorization::Card(capture)).await?;
//! ```

pub mod analytics;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod submission;
pub mod wallet;

pub use analytics::HttpAnalytics;
pub use backend::{CheckoutBackend, HttpBackend, MockBackend};
pub use config::{AnalyticsConfig, ApiConfig, BypassHeader};
pub use error::{PaymentError, Result};
pub use gateway::{CardCapture, Cardholder, ClientSideGateway, PaymentGateway};
pub use loader::{DealLoader, LoadOutcome};
pub use submission::{Authorization, InFlight, OrderConfirmation, PreparedOrder, SubmissionGuard, Submitter};
pub use wallet::{WalletButton, WalletDisplay, WalletTokenHandler};
