//! Checkout State Store
//!
//! Holds the multi-section form data for one checkout session. Updates are
//! shallow merges into a named section; the store itself performs no I/O.
//! Callers that need side effects (add-on persistence, for example) register
//! a [`StateObserver`], which is notified after every successful update.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::country::normalize_country;
use crate::error::{CheckoutError, Result};
use crate::flow::Step;
use crate::model::Deal;
use crate::pricing::{PaymentMethod, PricingEngine, Quote};
use crate::reconcile::{self, Reconciliation};
use crate::validation::{self, FieldErrors};

/// Named form section
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Shipping,
    AddOns,
    Invoices,
    Payment,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::AddOns => "add_ons",
            Self::Invoices => "invoices",
            Self::Payment => "payment",
        }
    }
}

impl FromStr for Section {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shipping" => Ok(Self::Shipping),
            "add_ons" | "addons" | "addOns" => Ok(Self::AddOns),
            "invoices" => Ok(Self::Invoices),
            "payment" => Ok(Self::Payment),
            other => Err(CheckoutError::UnknownSection(other.to_string())),
        }
    }
}

/// Contact and shipping address
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingDetails {
    /// Seed from the deal's mailing address and contact fields
    pub fn from_deal(deal: &Deal) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            first_name: field(&deal.contact_first_name),
            last_name: field(&deal.contact_last_name),
            email: field(&deal.contact_email),
            phone: field(&deal.contact_phone),
            address_line1: field(&deal.mailing_address_line1),
            address_line2: field(&deal.mailing_address_line2),
            city: field(&deal.mailing_address_city),
            state: field(&deal.mailing_address_state),
            postal_code: field(&deal.mailing_address_postal_code),
            country: deal
                .mailing_address_country
                .as_deref()
                .map(normalize_country)
                .unwrap_or_default(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Partial shipping update; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShippingPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Payment method and billing fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub cardholder_name: String,
    pub billing_same_as_shipping: bool,
    pub billing_address_line1: String,
    pub billing_address_line2: String,
    pub billing_city: String,
    pub billing_state: String,
    pub billing_postal_code: String,
    pub billing_country: String,
}

impl Default for PaymentDetails {
    fn default() -> Self {
        Self {
            method: PaymentMethod::Card,
            cardholder_name: String::new(),
            billing_same_as_shipping: true,
            billing_address_line1: String::new(),
            billing_address_line2: String::new(),
            billing_city: String::new(),
            billing_state: String::new(),
            billing_postal_code: String::new(),
            billing_country: String::new(),
        }
    }
}

/// Partial payment update; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaymentPatch {
    pub method: Option<PaymentMethod>,
    pub cardholder_name: Option<String>,
    pub billing_same_as_shipping: Option<bool>,
    pub billing_address_line1: Option<String>,
    pub billing_address_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: Option<String>,
}

/// Replace `target` when `value` is present and record the field as edited
fn merge_field(target: &mut String, value: Option<String>, name: &'static str, edited: &mut Vec<&'static str>) {
    if let Some(value) = value {
        *target = value;
        edited.push(name);
    }
}

impl ShippingDetails {
    fn apply(&mut self, patch: ShippingPatch) -> Vec<&'static str> {
        let mut edited = Vec::new();
        merge_field(&mut self.first_name, patch.first_name, "first_name", &mut edited);
        merge_field(&mut self.last_name, patch.last_name, "last_name", &mut edited);
        merge_field(&mut self.email, patch.email, "email", &mut edited);
        merge_field(&mut self.phone, patch.phone, "phone", &mut edited);
        merge_field(&mut self.address_line1, patch.address_line1, "address_line1", &mut edited);
        merge_field(&mut self.address_line2, patch.address_line2, "address_line2", &mut edited);
        merge_field(&mut self.city, patch.city, "city", &mut edited);
        merge_field(&mut self.state, patch.state, "state", &mut edited);
        merge_field(&mut self.postal_code, patch.postal_code, "postal_code", &mut edited);
        merge_field(
            &mut self.country,
            patch.country.map(|c| normalize_country(&c)),
            "country",
            &mut edited,
        );
        edited
    }
}

impl PaymentDetails {
    fn apply(&mut self, patch: PaymentPatch) -> Vec<&'static str> {
        let mut edited = Vec::new();
        if let Some(method) = patch.method {
            self.method = method;
            edited.push("method");
            edited.push("cardholder_name");
        }
        if let Some(same) = patch.billing_same_as_shipping {
            self.billing_same_as_shipping = same;
            edited.push("billing_same_as_shipping");
        }
        merge_field(&mut self.cardholder_name, patch.cardholder_name, "cardholder_name", &mut edited);
        merge_field(&mut self.billing_address_line1, patch.billing_address_line1, "billing_address_line1", &mut edited);
        merge_field(&mut self.billing_address_line2, patch.billing_address_line2, "billing_address_line2", &mut edited);
        merge_field(&mut self.billing_city, patch.billing_city, "billing_city", &mut edited);
        merge_field(&mut self.billing_state, patch.billing_state, "billing_state", &mut edited);
        merge_field(&mut self.billing_postal_code, patch.billing_postal_code, "billing_postal_code", &mut edited);
        merge_field(
            &mut self.billing_country,
            patch.billing_country.map(|c| normalize_country(&c)),
            "billing_country",
            &mut edited,
        );
        edited
    }
}

/// A partial update addressed to one section
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionUpdate {
    Shipping(ShippingPatch),
    AddOns(BTreeMap<String, bool>),
    Invoices(BTreeMap<String, bool>),
    Payment(PaymentPatch),
}

impl SectionUpdate {
    pub fn section(&self) -> Section {
        match self {
            Self::Shipping(_) => Section::Shipping,
            Self::AddOns(_) => Section::AddOns,
            Self::Invoices(_) => Section::Invoices,
            Self::Payment(_) => Section::Payment,
        }
    }

    /// Decode a JSON payload addressed to a section name
    pub fn from_json(section: &str, value: serde_json::Value) -> Result<Self> {
        let section = Section::from_str(section)?;
        let invalid = |e: serde_json::Error| CheckoutError::InvalidSectionData {
            section: section.as_str().to_string(),
            reason: e.to_string(),
        };
        Ok(match section {
            Section::Shipping => Self::Shipping(serde_json::from_value(value).map_err(invalid)?),
            Section::AddOns => Self::AddOns(serde_json::from_value(value).map_err(invalid)?),
            Section::Invoices => Self::Invoices(serde_json::from_value(value).map_err(invalid)?),
            Section::Payment => Self::Payment(serde_json::from_value(value).map_err(invalid)?),
        })
    }
}

/// Session-scoped form state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutState {
    pub shipping: ShippingDetails,

    /// Add-on id to selected flag
    pub add_ons: BTreeMap<String, bool>,

    /// Invoice id to selected flag; every invoice starts selected
    pub invoices: BTreeMap<String, bool>,

    pub payment: PaymentDetails,

    pub current_step: Step,
}

/// Seed add-on flags: every available id `false`, overlaid with persisted
/// flags whose ids still exist on the deal
pub fn seed_add_ons(deal: &Deal, persisted: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
    let mut seeded: BTreeMap<String, bool> = deal.add_on_ids().map(|id| (id.to_string(), false)).collect();
    for (id, selected) in persisted {
        match seeded.get_mut(id) {
            Some(flag) => *flag = *selected,
            None => tracing::debug!(deal_id = %deal.id, add_on_id = %id, "Dropping stale add-on selection"),
        }
    }
    seeded
}

impl CheckoutState {
    /// Initial state for a freshly loaded deal
    pub fn seed(deal: &Deal, initial_step: Step, persisted_add_ons: &BTreeMap<String, bool>) -> Self {
        Self {
            shipping: ShippingDetails::from_deal(deal),
            add_ons: seed_add_ons(deal, persisted_add_ons),
            invoices: deal.invoice_ids().map(|id| (id.to_string(), true)).collect(),
            payment: PaymentDetails::default(),
            current_step: initial_step,
        }
    }
}

/// Post-update hook
pub trait StateObserver: Send + Sync {
    fn on_update(&self, section: Section, state: &CheckoutState);
}

/// Checkout state store for one deal
pub struct CheckoutStore {
    deal: Deal,
    state: CheckoutState,
    errors: FieldErrors,
    observers: Vec<Box<dyn StateObserver>>,
}

impl std::fmt::Debug for CheckoutStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutStore")
            .field("deal_id", &self.deal.id)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl CheckoutStore {
    /// Seed the store for a freshly loaded deal
    pub fn initialize(deal: Deal, initial_step: Step, persisted_add_ons: &BTreeMap<String, bool>) -> Self {
        let state = CheckoutState::seed(&deal, initial_step, persisted_add_ons);
        Self {
            deal,
            state,
            errors: FieldErrors::new(),
            observers: Vec::new(),
        }
    }

    /// Register a post-update hook
    pub fn observe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn deal(&self) -> &Deal {
        &self.deal
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Shallow-merge a partial update into its section
    pub fn update_section(&mut self, update: SectionUpdate) -> Result<()> {
        let section = update.section();
        match update {
            SectionUpdate::Shipping(patch) => {
                for field in self.state.shipping.apply(patch) {
                    self.errors.clear(field);
                }
            }
            SectionUpdate::Payment(patch) => {
                for field in self.state.payment.apply(patch) {
                    self.errors.clear(field);
                }
            }
            SectionUpdate::AddOns(patch) => {
                for (id, selected) in &patch {
                    let addon = self
                        .deal
                        .add_on(id)
                        .ok_or_else(|| CheckoutError::NotSelectable(id.clone()))?;
                    if *selected && !reconcile::is_add_on_selectable(&self.deal, addon) {
                        return Err(CheckoutError::NotSelectable(id.clone()));
                    }
                }
                self.state.add_ons.extend(patch);
            }
            SectionUpdate::Invoices(patch) => {
                for (id, selected) in &patch {
                    let invoice = self
                        .deal
                        .invoice(id)
                        .ok_or_else(|| CheckoutError::NotSelectable(id.clone()))?;
                    if *selected && reconcile::is_paid(invoice) {
                        return Err(CheckoutError::NotSelectable(id.clone()));
                    }
                }
                self.state.invoices.extend(patch);
            }
        }

        tracing::debug!(deal_id = %self.deal.id, section = section.as_str(), "Checkout section updated");

        for observer in &self.observers {
            observer.on_update(section, &self.state);
        }
        Ok(())
    }

    /// Flip one add-on; returns the new flag
    pub fn toggle_add_on(&mut self, id: &str) -> Result<bool> {
        let selected = !self.state.add_ons.get(id).copied().unwrap_or(false);
        self.update_section(SectionUpdate::AddOns(BTreeMap::from([(id.to_string(), selected)])))?;
        Ok(selected)
    }

    /// Flip one invoice; returns the new flag
    pub fn toggle_invoice(&mut self, id: &str) -> Result<bool> {
        let selected = !self.state.invoices.get(id).copied().unwrap_or(false);
        self.update_section(SectionUpdate::Invoices(BTreeMap::from([(id.to_string(), selected)])))?;
        Ok(selected)
    }

    pub fn set_current_step(&mut self, step: Step) {
        self.state.current_step = step;
    }

    /// Add-on ids flagged `true`, in deal order
    pub fn selected_add_on_ids(&self) -> Vec<String> {
        flagged(self.deal.add_on_ids(), &self.state.add_ons)
    }

    /// Invoice ids flagged `true`, in deal order
    pub fn selected_invoice_ids(&self) -> Vec<String> {
        flagged(self.deal.invoice_ids(), &self.state.invoices)
    }

    pub fn reconciliation(&self) -> Reconciliation {
        reconcile::reconcile(&self.deal, &self.state.add_ons, &self.state.invoices)
    }

    /// Price the current selections
    pub fn quote(&self, engine: &PricingEngine) -> Quote {
        engine.quote(
            &self.deal,
            &self.selected_add_on_ids(),
            &self.selected_invoice_ids(),
            self.state.payment.method,
            &self.state.shipping.country,
        )
    }

    /// Validate the fields a step owns; failures are kept for display
    pub fn validate_step(&mut self, step: Step) -> Result<()> {
        let errors = match step {
            Step::Shipping => validation::validate_shipping(&self.state.shipping),
            Step::Addons => FieldErrors::new(),
            Step::Payment => validation::validate_payment(&self.state.payment),
        };
        if errors.is_empty() {
            return Ok(());
        }
        self.errors.merge(errors.clone());
        Err(CheckoutError::Validation(errors))
    }
}

fn flagged<'a>(ids: impl Iterator<Item = &'a str>, flags: &BTreeMap<String, bool>) -> Vec<String> {
    ids.filter(|id| flags.get(*id).copied().unwrap_or(false))
        .map(String::from)
        .collect()
}
