//! Selection Reconciler
//!
//! Derives view-ready selection sets from raw deal data and the current
//! selection maps. The pricing engine applies the same eligibility
//! predicates, so a same-tier subscription or a paid invoice never reaches a
//! charge even when its map entry is `true`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{AddOn, Deal, Invoice};

/// Paid invoices are excluded from charging and rendered as disabled
pub fn is_paid(invoice: &Invoice) -> bool {
    invoice.status.trim().eq_ignore_ascii_case("paid")
}

/// Subscription add-on priced at or below the active plan: already owned
pub fn is_same_tier_subscription(addon: &AddOn, active_amount: Option<Decimal>) -> bool {
    match active_amount {
        Some(active) => addon.is_subscription() && addon.amount <= active,
        None => false,
    }
}

/// Subscription add-on priced above the active plan
pub fn is_upgrade(addon: &AddOn, has_active: bool, active_amount: Option<Decimal>) -> bool {
    addon.is_subscription() && has_active && addon.amount > active_amount.unwrap_or(Decimal::ZERO)
}

/// Whether an add-on may be toggled by the customer
pub fn is_add_on_selectable(deal: &Deal, addon: &AddOn) -> bool {
    !is_same_tier_subscription(addon, deal.active_subscription_amount)
}

/// Badge shown next to an add-on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOnBadge {
    Available,
    /// Same tier as the active plan
    Owned,
    /// Replaces the active plan from the next billing cycle
    Upgrade,
}

/// Invoice state for display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceBadge {
    Pending,
    Paid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddOnView {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    pub badge: AddOnBadge,
    pub selected: bool,
    pub selectable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvoiceView {
    pub id: String,
    pub amount: Decimal,
    pub due_date: Option<String>,
    pub badge: InvoiceBadge,
    pub selected: bool,
}

/// Aggregated product line across the chargeable invoices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub name: String,
    pub quantity: u32,
    pub total: Decimal,
}

/// Reconciled view of a deal against the current selection maps
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub add_ons: Vec<AddOnView>,
    pub invoices: Vec<InvoiceView>,

    /// Selected, selectable add-on ids in deal order
    pub chargeable_add_on_ids: Vec<String>,

    /// Selected, unpaid invoice ids in deal order
    pub chargeable_invoice_ids: Vec<String>,

    pub product_lines: Vec<ProductLine>,
}

fn contains_id<S: AsRef<str>>(ids: &[S], id: &str) -> bool {
    ids.iter().any(|candidate| candidate.as_ref() == id)
}

/// Chargeable add-ons: selected and not already owned, in deal order
pub fn chargeable_add_ons<'a, S: AsRef<str>>(deal: &'a Deal, selected: &[S]) -> Vec<&'a AddOn> {
    deal.add_ons
        .iter()
        .filter(|addon| contains_id(selected, &addon.id))
        .filter(|addon| is_add_on_selectable(deal, addon))
        .collect()
}

/// Chargeable invoices: selected and not paid, in deal order
pub fn chargeable_invoices<'a, S: AsRef<str>>(deal: &'a Deal, selected: &[S]) -> Vec<&'a Invoice> {
    deal.invoices
        .iter()
        .filter(|invoice| contains_id(selected, &invoice.id))
        .filter(|invoice| !is_paid(invoice))
        .collect()
}

/// Annotate every add-on and invoice of `deal` against the selection maps
pub fn reconcile(
    deal: &Deal,
    add_on_selection: &BTreeMap<String, bool>,
    invoice_selection: &BTreeMap<String, bool>,
) -> Reconciliation {
    let active = deal.active_subscription_amount;

    let add_ons: Vec<AddOnView> = deal
        .add_ons
        .iter()
        .map(|addon| {
            let badge = if is_same_tier_subscription(addon, active) {
                AddOnBadge::Owned
            } else if is_upgrade(addon, deal.has_active_subscription, active) {
                AddOnBadge::Upgrade
            } else {
                AddOnBadge::Available
            };
            let selectable = badge != AddOnBadge::Owned;
            AddOnView {
                id: addon.id.clone(),
                name: addon.display_name().to_string(),
                amount: addon.amount,
                badge,
                selected: selectable && add_on_selection.get(&addon.id).copied().unwrap_or(false),
                selectable,
            }
        })
        .collect();

    let invoices: Vec<InvoiceView> = deal
        .invoices
        .iter()
        .map(|invoice| {
            let paid = is_paid(invoice);
            InvoiceView {
                id: invoice.id.clone(),
                amount: invoice.amount,
                due_date: invoice.due_date.clone(),
                badge: if paid { InvoiceBadge::Paid } else { InvoiceBadge::Pending },
                selected: !paid && invoice_selection.get(&invoice.id).copied().unwrap_or(false),
            }
        })
        .collect();

    let chargeable_add_on_ids: Vec<String> = add_ons
        .iter()
        .filter(|view| view.selected)
        .map(|view| view.id.clone())
        .collect();

    let chargeable_invoice_ids: Vec<String> = invoices
        .iter()
        .filter(|view| view.selected)
        .map(|view| view.id.clone())
        .collect();

    let product_lines = summarize_products(chargeable_invoices(deal, &chargeable_invoice_ids));

    Reconciliation {
        add_ons,
        invoices,
        chargeable_add_on_ids,
        chargeable_invoice_ids,
        product_lines,
    }
}

/// Merge invoice products by name, keeping first-seen order
fn summarize_products(invoices: Vec<&Invoice>) -> Vec<ProductLine> {
    let mut lines: Vec<ProductLine> = Vec::new();
    for product in invoices.into_iter().flat_map(|i| i.products.iter()) {
        match lines.iter_mut().find(|line| line.name == product.name) {
            Some(line) => {
                line.quantity += product.quantity;
                line.total += product.line_total();
            }
            None => lines.push(ProductLine {
                name: product.name.clone(),
                quantity: product.quantity,
                total: product.line_total(),
            }),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddOnType, DealType, InvoiceProduct, PricingBehavior};
    use rust_decimal_macros::dec;

    fn addon(id: &str, addon_type: AddOnType, amount: Decimal) -> AddOn {
        AddOn {
            id: id.into(),
            addon_type,
            amount,
            pricing_behavior: PricingBehavior::Replace,
            product_name: None,
        }
    }

    fn invoice(id: &str, status: &str, amount: Decimal) -> Invoice {
        Invoice {
            id: id.into(),
            status: status.into(),
            amount,
            due_date: None,
            products: vec![InvoiceProduct { name: "Panel".into(), quantity: 1, price: amount }],
        }
    }

    fn selection(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_is_paid_case_insensitive() {
        assert!(is_paid(&invoice("i", "PAID", dec!(1))));
        assert!(is_paid(&invoice("i", "paid", dec!(1))));
        assert!(!is_paid(&invoice("i", "Awaiting Payment", dec!(1))));
    }

    #[test]
    fn test_subscription_tiers() {
        let same = addon("s", AddOnType::Subscription, dec!(29));
        let higher = addon("h", AddOnType::Subscription, dec!(59));
        let hardware = addon("x", AddOnType::OneTime, dec!(5));

        assert!(is_same_tier_subscription(&same, Some(dec!(29))));
        assert!(!is_same_tier_subscription(&higher, Some(dec!(29))));
        assert!(!is_same_tier_subscription(&hardware, Some(dec!(29))));
        assert!(!is_same_tier_subscription(&same, None));

        assert!(is_upgrade(&higher, true, Some(dec!(29))));
        assert!(!is_upgrade(&higher, false, Some(dec!(29))));
        assert!(!is_upgrade(&same, true, Some(dec!(29))));
    }

    #[test]
    fn test_reconcile_excludes_paid_and_owned() {
        let mut deal = Deal::new("d1", DealType::Subscription, dec!(0));
        deal.has_active_subscription = true;
        deal.active_subscription_amount = Some(dec!(29));
        deal.add_ons = vec![
            addon("owned", AddOnType::Subscription, dec!(29)),
            addon("upgrade", AddOnType::Subscription, dec!(59)),
        ];
        deal.invoices = vec![invoice("paid", "Paid", dec!(10)), invoice("open", "Open", dec!(15))];

        let result = reconcile(
            &deal,
            &selection(&[("owned", true), ("upgrade", true)]),
            &selection(&[("paid", true), ("open", true)]),
        );

        assert_eq!(result.chargeable_add_on_ids, vec!["upgrade".to_string()]);
        assert_eq!(result.chargeable_invoice_ids, vec!["open".to_string()]);
        assert_eq!(result.add_ons[0].badge, AddOnBadge::Owned);
        assert!(!result.add_ons[0].selectable);
        assert_eq!(result.add_ons[1].badge, AddOnBadge::Upgrade);
        assert_eq!(result.invoices[0].badge, InvoiceBadge::Paid);
        assert_eq!(result.product_lines.len(), 1);
        assert_eq!(result.product_lines[0].total, dec!(15));
    }
}
