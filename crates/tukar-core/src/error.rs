//! # Violation Types
//!
//! Typed findings from draft validation.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  tukar-core (this file)                                             │
//! │  └── Violation       - one broken legality rule, client-fixable     │
//! │                                                                     │
//! │  tukar-db (separate crate)                                          │
//! │  ├── DbError         - storage/infrastructure failures              │
//! │  ├── Conflict        - state changed between preview and commit     │
//! │  └── ExchangeError   - Validation | Conflict | Storage union        │
//! │                                                                     │
//! │  Flow: Vec<Violation> → ExchangeError::Validation → dashboard form  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every message names the product and the numbers involved
//! 3. Violations are enum variants, never String
//! 4. The variant is the machine-readable reason; Display is the
//!    human-readable message

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Item Side
// =============================================================================

/// Which half of a draft row a violation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemSide {
    /// The previously-billed item being taken back.
    Old,
    /// The item going out in its place.
    Replacement,
}

impl std::fmt::Display for ItemSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemSide::Old => write!(f, "old item"),
            ItemSide::Replacement => write!(f, "replacement item"),
        }
    }
}

// =============================================================================
// Violation
// =============================================================================

/// A single broken legality rule in an exchange draft.
///
/// Validation collects every violation it finds (the dashboard shows them
/// per field), so these travel in a `Vec` rather than failing fast.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The draft has no exchange code.
    #[error("exchange code is required")]
    MissingCode,

    /// The draft has no swap date.
    #[error("swap date is required")]
    MissingSwapDate,

    /// The draft names no target invoice.
    #[error("target invoice is required")]
    MissingInvoice,

    /// An edit draft tried to re-point the record at another invoice.
    /// The invoice is fixed at creation.
    #[error("exchange belongs to invoice {expected}, cannot move it to {got}")]
    InvoiceImmutable { expected: String, got: String },

    /// The draft has no item rows at all.
    #[error("at least one old item and one replacement item are required")]
    NoRows,

    /// Too many item rows for a single exchange.
    #[error("exchange cannot have more than {max} item rows")]
    TooManyRows { max: usize },

    /// A row has no product selected on one side.
    #[error("row {row}: no {side} selected")]
    MissingProduct { row: usize, side: ItemSide },

    /// A row's quantity is zero or negative.
    #[error("row {row}: {side} quantity must be positive")]
    NonPositiveQuantity { row: usize, side: ItemSide },

    /// A row's quantity exceeds the per-row cap.
    #[error("row {row}: {side} quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge {
        row: usize,
        side: ItemSide,
        requested: i64,
        max: i64,
    },

    /// A row references a product the catalog does not know.
    #[error("row {row}: {side} product {product_id} does not exist")]
    UnknownProduct {
        row: usize,
        side: ItemSide,
        product_id: String,
    },

    /// An old-item row asks for more than the invoice still carries.
    #[error("insufficient old-item quantity for {product_id}: available {available}, requested {requested}")]
    InsufficientOldItem {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A replacement row asks for more than stock plus prior allocation.
    #[error("insufficient replacement quantity for {product_id}: available {available}, requested {requested}")]
    InsufficientReplacement {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The aggregate replacement value is below the aggregate old value.
    /// This violation is global, not per-row.
    #[error("replacement value {replacement_value} is below old value {old_value}")]
    ValueFloor {
        old_value: Money,
        replacement_value: Money,
    },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        let violation = Violation::InsufficientOldItem {
            product_id: "p-teh-botol".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            violation.to_string(),
            "insufficient old-item quantity for p-teh-botol: available 3, requested 5"
        );

        let violation = Violation::ValueFloor {
            old_value: Money::from_rupiah(20_000),
            replacement_value: Money::from_rupiah(15_000),
        };
        assert_eq!(
            violation.to_string(),
            "replacement value Rp15.000 is below old value Rp20.000"
        );
    }

    #[test]
    fn test_row_messages_name_the_side() {
        let violation = Violation::MissingProduct {
            row: 2,
            side: ItemSide::Replacement,
        };
        assert_eq!(violation.to_string(), "row 2: no replacement item selected");

        let violation = Violation::NonPositiveQuantity {
            row: 1,
            side: ItemSide::Old,
        };
        assert_eq!(violation.to_string(), "row 1: old item quantity must be positive");
    }
}
