//! Domain Models
//!
//! Deal data as served by the backend. Deals are fetched once per checkout
//! session and never mutated locally.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unique deal identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(String);

impl DealId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DealId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which pricing branch a deal follows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealType {
    OneTime,
    Subscription,
    #[serde(rename = "BOGO")]
    Bogo,
    Contract,
    /// Any type the backend adds later; priced from `amount`
    #[serde(other)]
    Other,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "OneTime",
            Self::Subscription => "Subscription",
            Self::Bogo => "BOGO",
            Self::Contract => "Contract",
            Self::Other => "Other",
        }
    }
}

/// Settlement currency
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Cad,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Cad => "CAD",
        }
    }

    /// Lowercase code as payment processors expect it
    pub fn processor_code(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Cad => "cad",
        }
    }
}

/// Add-on type. Only `Subscription` changes pricing behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddOnType {
    Subscription,
    OneTime,
    #[serde(other)]
    Other,
}

/// How a single selected add-on combines with the deal base amount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PricingBehavior {
    /// Add-on amount is added to the base
    Add,
    /// Add-on amount replaces the base
    #[default]
    Replace,
}

impl From<String> for PricingBehavior {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("add") {
            Self::Add
        } else {
            Self::Replace
        }
    }
}

impl From<PricingBehavior> for String {
    fn from(value: PricingBehavior) -> Self {
        match value {
            PricingBehavior::Add => "add".into(),
            PricingBehavior::Replace => "replace".into(),
        }
    }
}

/// An optional product attached to a deal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: String,

    #[serde(rename = "type")]
    pub addon_type: AddOnType,

    /// Price; arrives as a decimal string
    pub amount: Decimal,

    #[serde(default)]
    pub pricing_behavior: PricingBehavior,

    #[serde(default)]
    pub product_name: Option<String>,
}

impl AddOn {
    pub fn is_subscription(&self) -> bool {
        self.addon_type == AddOnType::Subscription
    }

    /// Name shown in summaries
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(&self.id)
    }
}

/// A product line on an invoice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceProduct {
    pub name: String,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    pub price: Decimal,
}

fn default_quantity() -> u32 {
    1
}

impl InvoiceProduct {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An invoice attached to a deal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,

    /// `Paid`, `Open`, `Awaiting Payment`, ...
    pub status: String,

    pub amount: Decimal,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub products: Vec<InvoiceProduct>,
}

/// The purchasable unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub deal_type: DealType,

    #[serde(default)]
    pub amount: Decimal,

    #[serde(default)]
    pub monthly_subscription_price: Decimal,

    #[serde(default)]
    pub currency: Currency,

    #[serde(default)]
    pub has_active_subscription: bool,

    #[serde(default)]
    pub active_subscription_amount: Option<Decimal>,

    #[serde(default)]
    pub add_ons: Vec<AddOn>,

    #[serde(default)]
    pub invoices: Vec<Invoice>,

    #[serde(default)]
    pub contact_first_name: Option<String>,

    #[serde(default)]
    pub contact_last_name: Option<String>,

    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub contact_phone: Option<String>,

    #[serde(default)]
    pub mailing_address_line1: Option<String>,

    #[serde(default)]
    pub mailing_address_line2: Option<String>,

    #[serde(default)]
    pub mailing_address_city: Option<String>,

    #[serde(default)]
    pub mailing_address_state: Option<String>,

    #[serde(default)]
    pub mailing_address_postal_code: Option<String>,

    #[serde(default)]
    pub mailing_address_country: Option<String>,
}

impl Deal {
    /// Create a bare deal with no add-ons or invoices
    pub fn new(id: impl Into<String>, deal_type: DealType, amount: Decimal) -> Self {
        Self {
            id: DealId::from_string(id),
            name: None,
            deal_type,
            amount,
            monthly_subscription_price: Decimal::ZERO,
            currency: Currency::Usd,
            has_active_subscription: false,
            active_subscription_amount: None,
            add_ons: Vec::new(),
            invoices: Vec::new(),
            contact_first_name: None,
            contact_last_name: None,
            contact_email: None,
            contact_phone: None,
            mailing_address_line1: None,
            mailing_address_line2: None,
            mailing_address_city: None,
            mailing_address_state: None,
            mailing_address_postal_code: None,
            mailing_address_country: None,
        }
    }

    pub fn add_on(&self, id: &str) -> Option<&AddOn> {
        self.add_ons.iter().find(|a| a.id == id)
    }

    pub fn invoice(&self, id: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn add_on_ids(&self) -> impl Iterator<Item = &str> {
        self.add_ons.iter().map(|a| a.id.as_str())
    }

    pub fn invoice_ids(&self) -> impl Iterator<Item = &str> {
        self.invoices.iter().map(|i| i.id.as_str())
    }
}
