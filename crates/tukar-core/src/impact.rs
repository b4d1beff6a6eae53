//! # Financial Impact Calculator
//!
//! Computes the effect of a proposed set of old/replacement items on an
//! invoice's subtotal, discount and total.
//!
//! ## The Canonical Anchor
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Every record's effect is computed against the PRE-RECORD invoice   │
//! │  state:                                                             │
//! │                                                                     │
//! │    item_delta   = replacement_value − old_value                     │
//! │    new_subtotal = subtotal + item_delta                             │
//! │    new_discount = discount kind applied to new_subtotal             │
//! │                   (percentage rescales, flat amount does not)       │
//! │    new_total    = new_subtotal − new_discount + shipping            │
//! │    delta        = new_total − total                                 │
//! │                                                                     │
//! │  The create path passes the live invoice. The edit path reverses    │
//! │  the record first and passes the reversed invoice, anchored on the  │
//! │  record's stored base total, so repeated edits can never drift      │
//! │  from the true pre-exchange state.                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tax is deliberately absent from all of this.

use serde::Serialize;
use ts_rs::TS;

use crate::money::Money;
use crate::types::Invoice;

// =============================================================================
// Valued Item
// =============================================================================

/// A draft item row resolved against the catalog: product, quantity and
/// the unit value that counts in exchange math (selling price falling
/// back to cost).
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ValuedItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_value: Money,
}

impl ValuedItem {
    /// Value of this item (unit value × quantity).
    #[inline]
    pub fn value(&self) -> Money {
        self.unit_value.multiply_quantity(self.quantity)
    }
}

/// Sums the values of a set of items.
pub fn total_value(items: &[ValuedItem]) -> Money {
    items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.value())
}

// =============================================================================
// Impact Summary
// =============================================================================

/// The invoice-level effect of a proposed exchange. The payload behind
/// `previewImpact` and the numbers the manager persists at commit.
#[derive(Debug, Clone, Copy, Serialize, TS)]
#[ts(export)]
pub struct ImpactSummary {
    /// Σ old unit value × quantity.
    pub old_value: Money,
    /// Σ replacement unit value × quantity.
    pub replacement_value: Money,
    /// `replacement_value − old_value`. Persisted as the record's
    /// difference; never negative once validation has passed.
    pub item_delta: Money,
    pub new_subtotal: Money,
    pub new_discount_amount: Money,
    pub new_total: Money,
    /// `new_total − total before the exchange`.
    pub delta: Money,
}

/// Computes the financial impact of swapping `old_items` for
/// `replacement_items` on `invoice`.
///
/// `invoice` must be the pre-record state: the live invoice on the create
/// path, the reversed invoice on the edit path.
pub fn compute_impact(
    invoice: &Invoice,
    old_items: &[ValuedItem],
    replacement_items: &[ValuedItem],
) -> ImpactSummary {
    let old_value = total_value(old_items);
    let replacement_value = total_value(replacement_items);
    let item_delta = replacement_value - old_value;

    let new_subtotal = invoice.subtotal() + item_delta;
    let new_discount_amount = invoice.discount().amount_on(new_subtotal);
    let new_total = new_subtotal - new_discount_amount + invoice.shipping();

    ImpactSummary {
        old_value,
        replacement_value,
        item_delta,
        new_subtotal,
        new_discount_amount,
        new_total,
        delta: new_total - invoice.total(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
