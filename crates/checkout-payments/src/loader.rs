//! Deal Loader
//!
//! Fetches the deal exactly once per mount. Responses that arrive after the
//! loader was unmounted, or after a newer request superseded them, are
//! dropped instead of applied.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use checkout_core::{Deal, DealId};

use crate::backend::CheckoutBackend;
use crate::error::{PaymentError, Result};

/// Outcome of a load attempt
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Deal),

    /// Terminal for the session; shown as a not-found view
    NotFound(PaymentError),

    /// Already loaded for this mount
    Skipped,

    /// Response arrived for an outdated request or after unmount
    Stale,
}

/// Load-once deal fetcher
#[derive(Debug)]
pub struct DealLoader {
    started: AtomicBool,
    mounted: AtomicBool,
    generation: AtomicU64,
}

impl Default for DealLoader {
    fn default() -> Self {
        Self {
            started: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }
}

impl DealLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single fetch for this mount; `None` if already claimed
    pub fn begin(&self) -> Option<u64> {
        if self.started.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether a response for `generation` may still be applied
    pub fn accepts(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    /// Mount again; the next `begin` starts a fresh request
    pub fn mount(&self) {
        self.mounted.store(true, Ordering::Release);
        self.started.store(false, Ordering::Release);
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Fetch the deal unless this mount already did
    pub async fn load(&self, backend: &dyn CheckoutBackend, deal_id: &DealId) -> LoadOutcome {
        let Some(generation) = self.begin() else {
            return LoadOutcome::Skipped;
        };

        let result: Result<Deal> = backend.fetch_deal(deal_id).await;

        if !self.accepts(generation) {
            tracing::debug!(deal_id = %deal_id, generation, "Dropping stale deal response");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(deal) => {
                tracing::info!(deal_id = %deal_id, deal_type = deal.deal_type.as_str(), "Deal loaded");
                LoadOutcome::Loaded(deal)
            }
            Err(e) => {
                tracing::warn!(deal_id = %deal_id, error = %e, "Deal could not be loaded");
                LoadOutcome::NotFound(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MockBackend};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_loads_once_per_mount() {
        let backend = MockBackend::with_demo_deal();
        let loader = DealLoader::new();
        let id = DealId::from_string("demo");

        assert!(matches!(loader.load(&backend, &id).await, LoadOutcome::Loaded(_)));
        assert!(matches!(loader.load(&backend, &id).await, LoadOutcome::Skipped));
        assert_eq!(backend.calls(), vec![BackendCall::FetchDeal("demo".into())]);
    }

    #[tokio::test]
    async fn test_unknown_deal_is_terminal() {
        let backend = MockBackend::new();
        let loader = DealLoader::new();

        let outcome = loader.load(&backend, &DealId::from_string("missing")).await;
        assert!(matches!(outcome, LoadOutcome::NotFound(PaymentError::DealNotFound(_))));
        assert!(matches!(
            loader.load(&backend, &DealId::from_string("missing")).await,
            LoadOutcome::Skipped
        ));
    }

    #[tokio::test]
    async fn test_response_after_unmount_is_dropped() {
        let backend = Arc::new(MockBackend::with_demo_deal().with_latency(Duration::from_millis(50)));
        let loader = Arc::new(DealLoader::new());

        let task = {
            let (backend, loader) = (backend.clone(), loader.clone());
            tokio::spawn(async move { loader.load(backend.as_ref(), &DealId::from_string("demo")).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        loader.unmount();

        assert!(matches!(task.await.unwrap(), LoadOutcome::Stale));
    }

    #[test]
    fn test_remount_supersedes_earlier_request() {
        let loader = DealLoader::new();
        let first = loader.begin().unwrap();

        loader.unmount();
        loader.mount();
        let second = loader.begin().unwrap();

        assert!(!loader.accepts(first));
        assert!(loader.accepts(second));
    }
}
