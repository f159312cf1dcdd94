//! Pricing Engine
//!
//! Computes the chargeable total for a deal from the selected add-ons,
//! selected invoices, payment method and shipping country. Pure: no I/O and
//! no hidden state, so identical inputs always yield identical quotes.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌────────────────┐
//! │ Base amount  │──▶│ Add-on adjustment  │──▶│ Processing fee │──▶ total
//! │ (deal type)  │   │ (selection rules)  │   │ (country/method)│
//! └──────────────┘   └────────────────────┘   └────────────────┘
//! ```

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::country::is_united_states;
use crate::error::{CheckoutError, Result};
use crate::model::{Currency, Deal, DealType, PricingBehavior};
use crate::reconcile::{chargeable_add_ons, chargeable_invoices};

/// How the customer pays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    /// Apple Pay / Google Pay through the wallet button
    Wallet,
    #[serde(alias = "cheque")]
    Check,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Wallet => "wallet",
            Self::Check => "check",
        }
    }
}

/// Processing fee rates by shipping country
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Rate for United States addresses
    pub domestic_rate: Decimal,

    /// Rate for every other country
    pub international_rate: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            domestic_rate: dec!(0.029),
            international_rate: dec!(0.024),
        }
    }
}

impl FeePolicy {
    pub fn rate_for(&self, country: &str) -> Decimal {
        if is_united_states(country) {
            self.domestic_rate
        } else {
            self.international_rate
        }
    }
}

/// Breakdown of a computed total
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Amount selected by deal type
    pub base: Decimal,

    /// Change applied by the selected add-ons (may be negative when an
    /// add-on replaces a larger base)
    pub add_on_adjustment: Decimal,

    /// Total before the processing fee
    pub subtotal: Decimal,

    /// Rate applied, zero when no fee was charged
    pub fee_rate: Decimal,

    pub processing_fee: Decimal,

    /// Amount to charge today, 2 dp
    pub total: Decimal,

    pub currency: Currency,
}

impl Quote {
    /// Total in minor currency units, as the wallet button expects it
    pub fn minor_units(&self) -> i64 {
        (self.total * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0)
    }

    pub fn is_chargeable(&self) -> bool {
        self.total > Decimal::ZERO
    }

    /// Refuse submission of a zero total before any network call is made
    pub fn ensure_chargeable(&self) -> Result<()> {
        if self.is_chargeable() {
            Ok(())
        } else {
            Err(CheckoutError::ZeroTotal)
        }
    }
}

/// Applies the pricing policy to a deal
#[derive(Clone, Debug, Default)]
pub struct PricingEngine {
    fees: FeePolicy,
}

impl PricingEngine {
    pub fn new(fees: FeePolicy) -> Self {
        Self { fees }
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fees
    }

    /// Amount to charge today, non-negative and rounded to 2 dp
    pub fn compute_total<A: AsRef<str>, I: AsRef<str>>(
        &self,
        deal: &Deal,
        selected_add_on_ids: &[A],
        selected_invoice_ids: &[I],
        payment_method: PaymentMethod,
        shipping_country: &str,
    ) -> Decimal {
        self.quote(deal, selected_add_on_ids, selected_invoice_ids, payment_method, shipping_country)
            .total
    }

    /// Full breakdown of the total
    pub fn quote<A: AsRef<str>, I: AsRef<str>>(
        &self,
        deal: &Deal,
        selected_add_on_ids: &[A],
        selected_invoice_ids: &[I],
        payment_method: PaymentMethod,
        shipping_country: &str,
    ) -> Quote {
        let add_ons = chargeable_add_ons(deal, selected_add_on_ids);
        let invoice_total: Decimal = chargeable_invoices(deal, selected_invoice_ids)
            .iter()
            .map(|invoice| invoice.amount)
            .sum();

        let base = match deal.deal_type {
            DealType::OneTime => invoice_total,
            DealType::Subscription if deal.has_active_subscription => invoice_total,
            DealType::Subscription => deal.monthly_subscription_price,
            DealType::Bogo | DealType::Contract | DealType::Other => deal.amount,
        };

        // Subscription add-ons on an active plan take effect next cycle, no proration
        let subtotal = if deal.has_active_subscription {
            base + add_ons
                .iter()
                .filter(|addon| !addon.is_subscription())
                .map(|addon| addon.amount)
                .sum::<Decimal>()
        } else {
            match add_ons.as_slice() {
                [] => base,
                [single] if single.pricing_behavior == PricingBehavior::Add => base + single.amount,
                [single] => single.amount,
                // several add-ons replace the base with their sum
                several => several.iter().map(|addon| addon.amount).sum(),
            }
        };
        let subtotal = subtotal.max(Decimal::ZERO);

        let fee_applies = payment_method != PaymentMethod::Check
            && subtotal > Decimal::ZERO
            && match deal.deal_type {
                DealType::Subscription => deal.has_active_subscription,
                // selecting any add-on suppresses the fee on one-time deals
                DealType::OneTime => add_ons.is_empty(),
                DealType::Bogo | DealType::Contract | DealType::Other => true,
            };

        let fee_rate = if fee_applies {
            self.fees.rate_for(shipping_country)
        } else {
            Decimal::ZERO
        };

        let total = (subtotal * (Decimal::ONE + fee_rate))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        tracing::trace!(
            deal_id = %deal.id,
            deal_type = deal.deal_type.as_str(),
            %base,
            %subtotal,
            %fee_rate,
            %total,
            "Computed checkout total"
        );

        Quote {
            base,
            add_on_adjustment: subtotal - base,
            subtotal,
            fee_rate,
            processing_fee: total - subtotal,
            total,
            currency: deal.currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddOn, AddOnType, Invoice};

    const NONE: &[&str] = &[];

    fn addon(id: &str, addon_type: AddOnType, amount: Decimal, behavior: PricingBehavior) -> AddOn {
        AddOn {
            id: id.into(),
            addon_type,
            amount,
            pricing_behavior: behavior,
            product_name: None,
        }
    }

    fn invoice(id: &str, status: &str, amount: Decimal) -> Invoice {
        Invoice {
            id: id.into(),
            status: status.into(),
            amount,
            due_date: None,
            products: Vec::new(),
        }
    }

    fn one_time_deal() -> Deal {
        let mut deal = Deal::new("d1", DealType::OneTime, dec!(999));
        deal.invoices = vec![
            invoice("i1", "Open", dec!(50.00)),
            invoice("i2", "Awaiting Payment", dec!(20.00)),
            invoice("i3", "Paid", dec!(100.00)),
        ];
        deal
    }

    #[test]
    fn test_one_time_sums_selected_unpaid_invoices() {
        let engine = PricingEngine::default();
        let deal = one_time_deal();

        let quote = engine.quote(&deal, NONE, &["i1", "i2", "i3"], PaymentMethod::Check, "US");
        assert_eq!(quote.base, dec!(70.00));
        assert_eq!(quote.total, dec!(70.00));

        let empty = engine.compute_total(&deal, NONE, NONE, PaymentMethod::Card, "US");
        assert_eq!(empty, Decimal::ZERO);
    }

    #[test]
    fn test_paid_invoice_never_charged() {
        let engine = PricingEngine::default();
        let deal = one_time_deal();
        let total = engine.compute_total(&deal, NONE, &["i3"], PaymentMethod::Check, "US");
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_one_time_fee_only_without_add_ons() {
        let engine = PricingEngine::default();
        let deal = one_time_deal();

        let us = engine.quote(&deal, NONE, &["i1"], PaymentMethod::Card, "United States");
        assert_eq!(us.fee_rate, dec!(0.029));
        assert_eq!(us.total, dec!(51.45));

        let ca = engine.quote(&deal, NONE, &["i1"], PaymentMethod::Card, "Canada");
        assert_eq!(ca.fee_rate, dec!(0.024));
        assert_eq!(ca.total, dec!(51.20));
    }

    #[test]
    fn test_single_add_on_add_behavior() {
        let engine = PricingEngine::default();
        let mut deal = one_time_deal();
        deal.add_ons = vec![addon("warranty", AddOnType::OneTime, dec!(25.00), PricingBehavior::Add)];

        let quote = engine.quote(&deal, &["warranty"], &["i1"], PaymentMethod::Card, "US");
        assert_eq!(quote.subtotal, dec!(75.00));
        assert_eq!(quote.add_on_adjustment, dec!(25.00));
        // any selected add-on suppresses the one-time fee
        assert_eq!(quote.processing_fee, Decimal::ZERO);
        assert_eq!(quote.total, dec!(75.00));
    }

    #[test]
    fn test_single_add_on_replaces_base() {
        let engine = PricingEngine::default();
        let mut deal = one_time_deal();
        deal.add_ons = vec![addon("kit", AddOnType::OneTime, dec!(30.00), PricingBehavior::Replace)];

        let total = engine.compute_total(&deal, &["kit"], &["i1"], PaymentMethod::Check, "US");
        assert_eq!(total, dec!(30.00));
    }

    #[test]
    fn test_multiple_add_ons_sum_replaces_base() {
        let engine = PricingEngine::default();
        let mut deal = one_time_deal();
        deal.add_ons = vec![
            addon("a", AddOnType::OneTime, dec!(30.00), PricingBehavior::Add),
            addon("b", AddOnType::OneTime, dec!(45.00), PricingBehavior::Add),
        ];

        let quote = engine.quote(&deal, &["a", "b"], &["i1"], PaymentMethod::Card, "US");
        assert_eq!(quote.subtotal, dec!(75.00));
        assert_eq!(quote.total, dec!(75.00));
    }

    #[test]
    fn test_new_subscription_has_no_fee() {
        let engine = PricingEngine::default();
        let mut deal = Deal::new("s1", DealType::Subscription, dec!(500));
        deal.monthly_subscription_price = dec!(49.99);

        let quote = engine.quote(&deal, NONE, NONE, PaymentMethod::Card, "USA");
        assert_eq!(quote.total, dec!(49.99));
        assert_eq!(quote.processing_fee, Decimal::ZERO);
    }

    #[test]
    fn test_active_subscription_upgrade_is_free_today() {
        let engine = PricingEngine::default();
        let mut deal = Deal::new("s2", DealType::Subscription, dec!(0));
        deal.monthly_subscription_price = dec!(29);
        deal.has_active_subscription = true;
        deal.active_subscription_amount = Some(dec!(29));
        deal.add_ons = vec![
            addon("pro", AddOnType::Subscription, dec!(59), PricingBehavior::Replace),
            addon("owned", AddOnType::Subscription, dec!(29), PricingBehavior::Add),
            addon("router", AddOnType::OneTime, dec!(100), PricingBehavior::Replace),
        ];
        deal.invoices = vec![invoice("i1", "Open", dec!(40))];

        let upgrade_only = engine.quote(&deal, &["pro"], NONE, PaymentMethod::Card, "US");
        assert_eq!(upgrade_only.subtotal, Decimal::ZERO);
        assert_eq!(upgrade_only.total, Decimal::ZERO);

        // owned tier ignored even if marked selected; one-time add-on and invoice are fee-bearing
        let mixed = engine.quote(&deal, &["pro", "owned", "router"], &["i1"], PaymentMethod::Card, "US");
        assert_eq!(mixed.subtotal, dec!(140));
        assert_eq!(mixed.total, dec!(144.06));

        let by_check = engine.compute_total(&deal, &["router"], &["i1"], PaymentMethod::Check, "US");
        assert_eq!(by_check, dec!(140));
    }

    #[test]
    fn test_contract_priced_from_amount() {
        let engine = PricingEngine::default();
        let deal = Deal::new("c1", DealType::Contract, dec!(1000));

        assert_eq!(engine.compute_total(&deal, NONE, NONE, PaymentMethod::Card, "Mexico"), dec!(1024.00));
        assert_eq!(engine.compute_total(&deal, NONE, NONE, PaymentMethod::Check, "Mexico"), dec!(1000));
    }

    #[test]
    fn test_bogo_priced_from_amount_ignoring_invoices() {
        let engine = PricingEngine::default();
        let mut deal = Deal::new("b1", DealType::Bogo, dec!(200));
        deal.invoices = vec![invoice("i1", "Open", dec!(50.00))];
        deal.add_ons = vec![addon("case", AddOnType::OneTime, dec!(30.00), PricingBehavior::Add)];

        let quote = engine.quote(&deal, NONE, &["i1"], PaymentMethod::Card, "US");
        assert_eq!(quote.base, dec!(200));
        assert_eq!(quote.total, dec!(205.80));

        // unlike one-time deals, an add-on keeps the fee
        let with_case = engine.quote(&deal, &["case"], NONE, PaymentMethod::Card, "US");
        assert_eq!(with_case.subtotal, dec!(230));
        assert_eq!(with_case.fee_rate, dec!(0.029));
        assert_eq!(with_case.total, dec!(236.67));

        assert_eq!(engine.compute_total(&deal, &["case"], NONE, PaymentMethod::Check, "US"), dec!(230));
    }

    #[test]
    fn test_one_time_deal_with_active_subscription() {
        let engine = PricingEngine::default();
        let mut deal = one_time_deal();
        deal.add_ons = vec![
            addon("plan", AddOnType::Subscription, dec!(99.00), PricingBehavior::Replace),
            addon("warranty", AddOnType::OneTime, dec!(25.00), PricingBehavior::Replace),
        ];

        // no active plan: two add-ons replace the invoices
        let inactive = engine.quote(&deal, &["plan", "warranty"], &["i1"], PaymentMethod::Card, "US");
        assert_eq!(inactive.total, dec!(124.00));

        // active plan: subscription add-on waits for the next cycle, the rest adds on
        deal.has_active_subscription = true;
        let active = engine.quote(&deal, &["plan", "warranty"], &["i1"], PaymentMethod::Card, "US");
        assert_eq!(active.base, dec!(50.00));
        assert_eq!(active.subtotal, dec!(75.00));
        assert_eq!(active.fee_rate, Decimal::ZERO);
        assert_eq!(active.total, dec!(75.00));

        let invoices_only = engine.quote(&deal, NONE, &["i1"], PaymentMethod::Card, "US");
        assert_eq!(invoices_only.total, dec!(51.45));
    }

    #[test]
    fn test_compute_total_is_idempotent() {
        let engine = PricingEngine::default();
        let deal = one_time_deal();
        let first = engine.quote(&deal, NONE, &["i1", "i2"], PaymentMethod::Card, "us");
        let second = engine.quote(&deal, NONE, &["i1", "i2"], PaymentMethod::Card, "us");
        assert_eq!(first, second);
    }

    #[test]
    fn test_minor_units_and_zero_guard() {
        let engine = PricingEngine::default();
        let deal = one_time_deal();

        let quote = engine.quote(&deal, NONE, &["i1"], PaymentMethod::Card, "US");
        assert_eq!(quote.minor_units(), 5145);
        assert!(quote.ensure_chargeable().is_ok());

        let zero = engine.quote(&deal, NONE, NONE, PaymentMethod::Card, "US");
        assert!(matches!(zero.ensure_chargeable(), Err(CheckoutError::ZeroTotal)));
    }
}
