//! # Exchange Validator
//!
//! Legality rules for an exchange draft, applied before any mutation is
//! attempted.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                              │
//! │                                                                     │
//! │  Layer 1: Dashboard form (TypeScript)                               │
//! │  ├── Basic format checks (empty fields, NaN)                        │
//! │  └── Immediate user feedback                                        │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: THIS MODULE (pure, side-effect-free)                      │
//! │  ├── Required fields, row structure                                 │
//! │  ├── Availability bounds per row                                    │
//! │  └── Aggregate value floor                                          │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: ExchangeManager commit guards (SQL)                       │
//! │  ├── Guarded line decrement                                         │
//! │  └── Guarded stock delta with non-negative floor                    │
//! │                                                                     │
//! │  The manager re-runs THIS MODULE on freshly-read state inside the   │
//! │  commit transaction; it never trusts a caller-supplied snapshot.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every violation found is collected (the dashboard reports per field);
//! validation never fails fast and never touches storage.

use std::collections::HashMap;

use crate::error::{ItemSide, Violation};
use crate::impact::total_value;
use crate::money::Money;
use crate::types::ExchangeDraft;
use crate::ValuedItem;
use crate::{MAX_EXCHANGE_ROWS, MAX_ITEM_QUANTITY};

/// Validates a draft against availability bounds and the catalog.
///
/// ## Arguments
/// * `draft` - the operator's proposed exchange
/// * `old_bounds` - product id → old-item availability
/// * `replacement_bounds` - product id → replacement availability
/// * `unit_values` - product id → exchange unit value; a product missing
///   here does not exist in the catalog
///
/// ## Rules (all must hold)
/// 1. code, swap date and target invoice are present
/// 2. at least one item row, at most [`MAX_EXCHANGE_ROWS`]
/// 3. every row has both products selected and positive quantities
///    within [`MAX_ITEM_QUANTITY`]
/// 4. old quantities fit the old-item bounds
/// 5. replacement quantities fit the replacement bounds
/// 6. aggregate replacement value ≥ aggregate old value (value floor)
///
/// Row numbers in violations are 1-based, matching the form.
pub fn validate(
    draft: &ExchangeDraft,
    old_bounds: &HashMap<String, i64>,
    replacement_bounds: &HashMap<String, i64>,
    unit_values: &HashMap<String, Money>,
) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    if draft.code.trim().is_empty() {
        violations.push(Violation::MissingCode);
    }
    if draft.swap_date.is_none() {
        violations.push(Violation::MissingSwapDate);
    }
    if draft.invoice_id.trim().is_empty() {
        violations.push(Violation::MissingInvoice);
    }

    if draft.rows.is_empty() {
        violations.push(Violation::NoRows);
    } else if draft.rows.len() > MAX_EXCHANGE_ROWS {
        violations.push(Violation::TooManyRows {
            max: MAX_EXCHANGE_ROWS,
        });
    }

    // Row checks. Rows that fail structurally are left out of the value
    // floor below; the floor is only meaningful once every row resolves.
    let mut all_rows_resolvable = !draft.rows.is_empty();
    let mut old_items = Vec::with_capacity(draft.rows.len());
    let mut replacement_items = Vec::with_capacity(draft.rows.len());

    for (index, row) in draft.rows.iter().enumerate() {
        let row_number = index + 1;

        let old = check_side(
            row_number,
            ItemSide::Old,
            &row.old_product_id,
            row.old_quantity,
            old_bounds,
            unit_values,
            &mut violations,
        );
        let replacement = check_side(
            row_number,
            ItemSide::Replacement,
            &row.replacement_product_id,
            row.replacement_quantity,
            replacement_bounds,
            unit_values,
            &mut violations,
        );

        match (old, replacement) {
            (Some(old), Some(replacement)) => {
                old_items.push(old);
                replacement_items.push(replacement);
            }
            _ => all_rows_resolvable = false,
        }
    }

    if all_rows_resolvable {
        let old_value = total_value(&old_items);
        let replacement_value = total_value(&replacement_items);
        if replacement_value < old_value {
            violations.push(Violation::ValueFloor {
                old_value,
                replacement_value,
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Checks one side of a row: selection, quantity range, catalog presence
/// and the availability bound. Returns the resolved item when the side is
/// structurally sound, `None` otherwise (bound violations still resolve:
/// they do not distort the value floor).
fn check_side(
    row_number: usize,
    side: ItemSide,
    product_id: &str,
    quantity: i64,
    bounds: &HashMap<String, i64>,
    unit_values: &HashMap<String, Money>,
    violations: &mut Vec<Violation>,
) -> Option<ValuedItem> {
    if product_id.trim().is_empty() {
        violations.push(Violation::MissingProduct {
            row: row_number,
            side,
        });
        return None;
    }

    if quantity <= 0 {
        violations.push(Violation::NonPositiveQuantity {
            row: row_number,
            side,
        });
        return None;
    }
    if quantity > MAX_ITEM_QUANTITY {
        violations.push(Violation::QuantityTooLarge {
            row: row_number,
            side,
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
        return None;
    }

    let Some(unit_value) = unit_values.get(product_id) else {
        violations.push(Violation::UnknownProduct {
            row: row_number,
            side,
            product_id: product_id.to_string(),
        });
        return None;
    };

    let available = bounds.get(product_id).copied().unwrap_or(0);
    if quantity > available {
        violations.push(match side {
            ItemSide::Old => Violation::InsufficientOldItem {
                product_id: product_id.to_string(),
                available,
                requested: quantity,
            },
            ItemSide::Replacement => Violation::InsufficientReplacement {
                product_id: product_id.to_string(),
                available,
                requested: quantity,
            },
        });
    }

    Some(ValuedItem {
        product_id: product_id.to_string(),
        quantity,
        unit_value: *unit_value,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DraftRow;
    use chrono::NaiveDate;

    fn draft(rows: Vec<DraftRow>) -> ExchangeDraft {
        ExchangeDraft {
            code: "TG-001".to_string(),
            invoice_id: "inv-1".to_string(),
            swap_date: NaiveDate::from_ymd_opt(2026, 8, 7),
            deadline: None,
            notes: None,
            actor_id: "op-1".to_string(),
            rows,
        }
    }

    fn row(old: (&str, i64), replacement: (&str, i64)) -> DraftRow {
        DraftRow {
            old_product_id: old.0.to_string(),
            old_quantity: old.1,
            replacement_product_id: replacement.0.to_string(),
            replacement_quantity: replacement.1,
        }
    }

    fn bounds(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries
            .iter()
            .map(|(id, qty)| (id.to_string(), *qty))
            .collect()
    }

    fn values(entries: &[(&str, i64)]) -> HashMap<String, Money> {
        entries
            .iter()
            .map(|(id, value)| (id.to_string(), Money::from_rupiah(*value)))
            .collect()
    }

    #[test]
    fn test_valid_draft_passes() {
        let draft = draft(vec![row(("teh", 2), ("sprite", 5))]);
        let result = validate(
            &draft,
            &bounds(&[("teh", 5)]),
            &bounds(&[("sprite", 10)]),
            &values(&[("teh", 10_000), ("sprite", 5_000)]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_header_fields() {
        let mut empty = draft(vec![]);
        empty.code = "  ".to_string();
        empty.invoice_id = String::new();
        empty.swap_date = None;

        let violations = validate(&empty, &HashMap::new(), &HashMap::new(), &HashMap::new())
            .unwrap_err();

        assert!(violations.contains(&Violation::MissingCode));
        assert!(violations.contains(&Violation::MissingSwapDate));
        assert!(violations.contains(&Violation::MissingInvoice));
        assert!(violations.contains(&Violation::NoRows));
    }

    #[test]
    fn test_unselected_product_and_bad_quantity() {
        let draft = draft(vec![row(("", 0), ("sprite", 3))]);
        let violations = validate(
            &draft,
            &HashMap::new(),
            &bounds(&[("sprite", 10)]),
            &values(&[("sprite", 5_000)]),
        )
        .unwrap_err();

        assert!(violations.contains(&Violation::MissingProduct {
            row: 1,
            side: ItemSide::Old
        }));
        // The quantity check for the same side is not reached once the
        // selection is missing, and the floor is suppressed.
        assert!(!violations
            .iter()
            .any(|v| matches!(v, Violation::ValueFloor { .. })));
    }

    #[test]
    fn test_old_item_bound_violation_names_both_numbers() {
        let draft = draft(vec![row(("teh", 5), ("sprite", 6))]);
        let violations = validate(
            &draft,
            &bounds(&[("teh", 3)]),
            &bounds(&[("sprite", 10)]),
            &values(&[("teh", 10_000), ("sprite", 10_000)]),
        )
        .unwrap_err();

        assert_eq!(
            violations,
            vec![Violation::InsufficientOldItem {
                product_id: "teh".to_string(),
                available: 3,
                requested: 5,
            }]
        );
        assert_eq!(
            violations[0].to_string(),
            "insufficient old-item quantity for teh: available 3, requested 5"
        );
    }

    #[test]
    fn test_product_absent_from_bounds_is_available_zero() {
        let draft = draft(vec![row(("mangga", 1), ("sprite", 2))]);
        let violations = validate(
            &draft,
            &bounds(&[]),
            &bounds(&[("sprite", 10)]),
            &values(&[("mangga", 10_000), ("sprite", 10_000)]),
        )
        .unwrap_err();

        assert!(violations.contains(&Violation::InsufficientOldItem {
            product_id: "mangga".to_string(),
            available: 0,
            requested: 1,
        }));
    }

    #[test]
    fn test_value_floor_is_global() {
        let draft = draft(vec![
            row(("teh", 2), ("sprite", 1)),
            row(("teh", 1), ("sprite", 1)),
        ]);
        let violations = validate(
            &draft,
            &bounds(&[("teh", 10)]),
            &bounds(&[("sprite", 10)]),
            &values(&[("teh", 10_000), ("sprite", 5_000)]),
        )
        .unwrap_err();

        // Old 30.000 vs replacement 10.000; one violation, not one per row.
        assert_eq!(
            violations,
            vec![Violation::ValueFloor {
                old_value: Money::from_rupiah(30_000),
                replacement_value: Money::from_rupiah(10_000),
            }]
        );
    }

    #[test]
    fn test_bound_violation_does_not_suppress_value_floor() {
        // Bounds failed but every row still resolves to a value, so the
        // operator sees the floor problem in the same round trip.
        let draft = draft(vec![row(("teh", 5), ("sprite", 1))]);
        let violations = validate(
            &draft,
            &bounds(&[("teh", 3)]),
            &bounds(&[("sprite", 10)]),
            &values(&[("teh", 10_000), ("sprite", 5_000)]),
        )
        .unwrap_err();

        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::InsufficientOldItem { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::ValueFloor { .. })));
    }

    #[test]
    fn test_quantity_cap() {
        let draft = draft(vec![row(("teh", MAX_ITEM_QUANTITY + 1), ("sprite", 1))]);
        let violations = validate(
            &draft,
            &bounds(&[("teh", 100_000)]),
            &bounds(&[("sprite", 10)]),
            &values(&[("teh", 10_000), ("sprite", 10_000)]),
        )
        .unwrap_err();

        assert!(violations.contains(&Violation::QuantityTooLarge {
            row: 1,
            side: ItemSide::Old,
            requested: MAX_ITEM_QUANTITY + 1,
            max: MAX_ITEM_QUANTITY,
        }));
    }
}
