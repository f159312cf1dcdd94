//! Add-on Selection Persistence
//!
//! One keyed entry per deal (`checkout_addons_{deal_id}`) holding the add-on
//! selection map as JSON. Entries survive a reload of the checkout and are
//! cleared once an order is confirmed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::{CheckoutError, Result};
use crate::model::DealId;
use crate::state::{CheckoutState, Section, StateObserver};

const KEY_PREFIX: &str = "checkout_addons_";

/// Storage key for a deal's add-on selections
pub fn storage_key(deal_id: &DealId) -> String {
    format!("{KEY_PREFIX}{deal_id}")
}

/// Keyed string store (local-storage equivalent)
pub trait SelectionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: String) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory selection store
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Persistence("selection store lock poisoned".into())
}

impl SelectionStore for MemorySelectionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Read persisted selections; a missing or corrupt entry yields an empty map
pub fn load_add_on_selections(store: &dyn SelectionStore, deal_id: &DealId) -> BTreeMap<String, bool> {
    let raw = match store.get(&storage_key(deal_id)) {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(deal_id = %deal_id, error = %e, "Could not read saved add-on selections");
            return BTreeMap::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(deal_id = %deal_id, error = %e, "Ignoring corrupt saved add-on selections");
        BTreeMap::new()
    })
}

pub fn save_add_on_selections(
    store: &dyn SelectionStore,
    deal_id: &DealId,
    selections: &BTreeMap<String, bool>,
) -> Result<()> {
    store.set(&storage_key(deal_id), serde_json::to_string(selections)?)
}

/// Called when an order confirmation is reached for the deal
pub fn clear_add_on_selections(store: &dyn SelectionStore, deal_id: &DealId) -> Result<()> {
    store.remove(&storage_key(deal_id))
}

/// Observer that writes the add-on map after every add-on update
pub struct AddOnPersistence {
    deal_id: DealId,
    store: Arc<dyn SelectionStore>,
}

impl AddOnPersistence {
    pub fn new(deal_id: DealId, store: Arc<dyn SelectionStore>) -> Self {
        Self { deal_id, store }
    }
}

impl StateObserver for AddOnPersistence {
    fn on_update(&self, section: Section, state: &CheckoutState) {
        if section != Section::AddOns {
            return;
        }
        if let Err(e) = save_add_on_selections(self.store.as_ref(), &self.deal_id, &state.add_ons) {
            tracing::warn!(deal_id = %self.deal_id, error = %e, "Failed to save add-on selections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Step;
    use crate::model::{AddOn, AddOnType, Deal, DealType, PricingBehavior};
    use crate::state::CheckoutStore;
    use rust_decimal_macros::dec;

    fn deal() -> Deal {
        let mut deal = Deal::new("d9", DealType::OneTime, dec!(0));
        deal.add_ons = ["a", "b"]
            .into_iter()
            .map(|id| AddOn {
                id: id.into(),
                addon_type: AddOnType::OneTime,
                amount: dec!(10),
                pricing_behavior: PricingBehavior::Add,
                product_name: None,
            })
            .collect();
        deal
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(storage_key(&DealId::from_string("123")), "checkout_addons_123");
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_defaults() {
        let store = MemorySelectionStore::new();
        store.set("checkout_addons_d9", "{not json".into()).unwrap();

        let loaded = load_add_on_selections(&store, &DealId::from_string("d9"));
        assert!(loaded.is_empty());

        let checkout = CheckoutStore::initialize(deal(), Step::Shipping, &loaded);
        assert_eq!(checkout.state().add_ons.get("a"), Some(&false));
    }

    #[test]
    fn test_observer_persists_and_reload_restores() {
        let store: Arc<dyn SelectionStore> = Arc::new(MemorySelectionStore::new());
        let deal_id = DealId::from_string("d9");

        let mut checkout = CheckoutStore::initialize(deal(), Step::Addons, &BTreeMap::new());
        checkout.observe(Box::new(AddOnPersistence::new(deal_id.clone(), store.clone())));
        checkout.toggle_add_on("b").unwrap();

        let saved = load_add_on_selections(store.as_ref(), &deal_id);
        assert_eq!(saved.get("b"), Some(&true));

        let reloaded = CheckoutStore::initialize(deal(), Step::Addons, &saved);
        assert_eq!(reloaded.selected_add_on_ids(), vec!["b".to_string()]);

        clear_add_on_selections(store.as_ref(), &deal_id).unwrap();
        assert!(load_add_on_selections(store.as_ref(), &deal_id).is_empty());
    }
}
