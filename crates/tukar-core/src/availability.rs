//! # Availability Calculator
//!
//! Derives, from an invoice's current lines, the product stock and the
//! exchange history attached to the invoice, how much of each product is
//! still eligible as an old item and how much may be drawn as a
//! replacement.
//!
//! ## Two Bounds, Two Directions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  OLD ITEMS (coming back from the customer)                          │
//! │                                                                     │
//! │    invoice line quantity is already net of every committed          │
//! │    exchange, so the line itself is the create-mode bound            │
//! │                                                                     │
//! │    edit mode adds the record-under-edit's own consumption back,     │
//! │    reconstructing even lines that were fully swapped away           │
//! │                                                                     │
//! │  REPLACEMENT ITEMS (going out of the warehouse)                     │
//! │                                                                     │
//! │    current stock + prior exchange allocation; a product the         │
//! │    record under edit already holds stays selectable at zero stock   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure: callers supply the facts, nothing is read
//! from storage.

use std::collections::HashMap;

use serde::Serialize;
use ts_rs::TS;

use crate::types::{ExchangeDetail, InvoiceLine, Product};

// =============================================================================
// Availability
// =============================================================================

/// Old-item and replacement-item bounds for one invoice, keyed by
/// product id. The payload behind `previewAvailability`.
#[derive(Debug, Clone, Default, Serialize, TS)]
#[ts(export)]
pub struct Availability {
    /// Product id → quantity still eligible for substitution.
    pub old_items: HashMap<String, i64>,
    /// Product id → quantity that may be drawn as replacement.
    pub replacement_items: HashMap<String, i64>,
}

// =============================================================================
// Old-Item Bounds
// =============================================================================

/// How much of each product on the invoice is still eligible as an old
/// item.
///
/// The invoice lines already carry cumulative consumption (the manager
/// decrements them at every commit), so in create mode the bound for a
/// product is simply its current line quantity.
///
/// In edit mode (`excluding = Some(record_id)`) the excluded record's own
/// `old_quantity` is added back per product: the edit must see the
/// invoice as it was before that record, without needing a separate
/// snapshot. A line the record consumed completely no longer exists, and
/// is reconstructed here from the record's own details.
pub fn available_old(
    lines: &[InvoiceLine],
    history: &[ExchangeDetail],
    excluding: Option<&str>,
) -> HashMap<String, i64> {
    let mut bounds: HashMap<String, i64> = lines
        .iter()
        .map(|line| (line.product_id.clone(), line.quantity))
        .collect();

    if let Some(record_id) = excluding {
        for detail in history.iter().filter(|d| d.exchange_id == record_id) {
            *bounds.entry(detail.old_product_id.clone()).or_insert(0) += detail.old_quantity;
        }
    }

    bounds
}

// =============================================================================
// Replacement-Item Bounds
// =============================================================================

/// How much of each product may be drawn as a replacement.
///
/// The bound is current stock plus the exchange allocation already
/// recorded against the invoice: every committed record has already taken
/// its replacement quantity out of stock, so adding the allocation back
/// yields the gross capacity the history has proven deliverable.
///
/// In edit mode only the excluded record's own allocation is added back
/// (the physical reversal inside the update transaction restores the
/// rest). Either way, a product that the record under edit already
/// references stays a valid option even at zero current stock or after
/// deactivation, because its own prior allocation is part of the bound.
pub fn available_replacement(
    products: &[Product],
    history: &[ExchangeDetail],
    excluding: Option<&str>,
) -> HashMap<String, i64> {
    let mut bounds: HashMap<String, i64> = products
        .iter()
        .map(|product| (product.id.clone(), product.current_stock))
        .collect();

    for detail in history {
        let relevant = match excluding {
            Some(record_id) => detail.exchange_id == record_id,
            None => true,
        };
        if relevant {
            *bounds
                .entry(detail.replacement_product_id.clone())
                .or_insert(0) += detail.replacement_quantity;
        }
    }

    bounds
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(product_id: &str, quantity: i64) -> InvoiceLine {
        InvoiceLine {
            id: format!("line-{product_id}"),
            invoice_id: "inv-1".to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price_rupiah: 10_000,
            unit_cost_rupiah: 8_000,
            created_at: Utc::now(),
        }
    }

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: id.to_uppercase(),
            name: id.to_string(),
            cost_rupiah: 8_000,
            selling_price_rupiah: Some(10_000),
            current_stock: stock,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn detail(exchange_id: &str, old: (&str, i64), replacement: (&str, i64)) -> ExchangeDetail {
        ExchangeDetail {
            id: format!("det-{exchange_id}-{}-{}", old.0, replacement.0),
            exchange_id: exchange_id.to_string(),
            old_product_id: old.0.to_string(),
            old_quantity: old.1,
            old_unit_value_rupiah: 10_000,
            old_line_price_rupiah: 10_000,
            old_line_cost_rupiah: 8_000,
            replacement_product_id: replacement.0.to_string(),
            replacement_quantity: replacement.1,
            replacement_unit_value_rupiah: 10_000,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_mode_old_bound_is_line_quantity() {
        // The line is already net of the committed exchange; the bound
        // must not subtract history a second time.
        let lines = vec![line("teh", 7), line("aqua", 4)];
        let history = vec![detail("x1", ("teh", 3), ("sprite", 3))];

        let bounds = available_old(&lines, &history, None);
        assert_eq!(bounds["teh"], 7);
        assert_eq!(bounds["aqua"], 4);
    }

    #[test]
    fn test_edit_mode_adds_back_own_consumption_only() {
        let lines = vec![line("teh", 7)];
        let history = vec![
            detail("x1", ("teh", 3), ("sprite", 3)),
            detail("x2", ("teh", 2), ("sprite", 2)),
        ];

        let bounds = available_old(&lines, &history, Some("x1"));
        assert_eq!(bounds["teh"], 10); // 7 + own 3, not + other record's 2
    }

    #[test]
    fn test_edit_mode_reconstructs_fully_swapped_line() {
        // The line for "teh" was consumed to zero and removed; editing the
        // record that consumed it must still see the original quantity.
        let lines: Vec<InvoiceLine> = vec![];
        let history = vec![detail("x1", ("teh", 10), ("sprite", 10))];

        let bounds = available_old(&lines, &history, Some("x1"));
        assert_eq!(bounds["teh"], 10);

        let create_bounds = available_old(&lines, &history, None);
        assert_eq!(create_bounds.get("teh"), None);
    }

    #[test]
    fn test_replacement_bound_is_stock_plus_allocation() {
        let products = vec![product("sprite", 6)];
        let history = vec![
            detail("x1", ("teh", 3), ("sprite", 4)),
            detail("x2", ("teh", 1), ("sprite", 2)),
        ];

        let bounds = available_replacement(&products, &history, None);
        assert_eq!(bounds["sprite"], 12); // 6 in stock + 4 + 2 allocated
    }

    #[test]
    fn test_replacement_edit_mode_adds_back_own_allocation_only() {
        let products = vec![product("sprite", 6)];
        let history = vec![
            detail("x1", ("teh", 3), ("sprite", 4)),
            detail("x2", ("teh", 1), ("sprite", 2)),
        ];

        let bounds = available_replacement(&products, &history, Some("x1"));
        assert_eq!(bounds["sprite"], 10); // 6 + own 4
    }

    #[test]
    fn test_zero_stock_product_stays_selectable_on_its_own_record() {
        // "fanta" is out of stock (or deactivated and absent from the
        // catalog slice entirely); the record that already holds it keeps
        // it available up to its own allocation.
        let products: Vec<Product> = vec![];
        let history = vec![detail("x1", ("teh", 2), ("fanta", 2))];

        let bounds = available_replacement(&products, &history, Some("x1"));
        assert_eq!(bounds["fanta"], 2);
    }
}
