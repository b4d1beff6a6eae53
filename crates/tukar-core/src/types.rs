//! # Domain Types
//!
//! Core domain types for the goods-exchange engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌────────────────┐  ┌────────────────┐  ┌─────────────────────┐   │
//! │  │    Product     │  │    Invoice     │  │   ExchangeRecord    │   │
//! │  │  ────────────  │  │  ────────────  │  │  ─────────────────  │   │
//! │  │  id (UUID)     │  │  id (UUID)     │  │  id (UUID)          │   │
//! │  │  sku           │  │  code          │  │  code               │   │
//! │  │  current_stock │  │  discount_kind │  │  base_total_rupiah  │   │
//! │  │  cost_rupiah   │  │  total_rupiah  │  │  difference_rupiah  │   │
//! │  └────────────────┘  └───────┬────────┘  └──────────┬──────────┘   │
//! │                              │                      │              │
//! │                      ┌───────▼────────┐  ┌──────────▼──────────┐   │
//! │                      │  InvoiceLine   │  │   ExchangeDetail    │   │
//! │                      │  quantity      │  │  old item half +    │   │
//! │                      │  price/cost    │  │  replacement half   │   │
//! │                      │  snapshots     │  │  (value snapshots)  │   │
//! │                      └────────────────┘  └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business code: (sku, invoice code, exchange code) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Discount
// =============================================================================

/// Discount rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10%, which keeps fractional percentages in integer math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a discount rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a discount rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// How an invoice's discount column is to be interpreted.
///
/// Stored as lowercase text in the `invoices.discount_kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `discount_value` is a flat amount in rupiah. Never rescaled.
    Amount,
    /// `discount_value` is a rate in basis points, applied to the subtotal.
    Percentage,
}

/// An invoice discount as a closed tagged union.
///
/// The string-kind + numeric-value pair from storage resolves into this
/// type exactly once (see [`Invoice::discount`]); everything downstream
/// matches exhaustively and cannot meet an unknown kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Discount {
    /// A flat discount amount.
    Amount(Money),
    /// A percentage of the subtotal.
    Percentage(DiscountRate),
}

impl Discount {
    /// Computes the discount amount for a given subtotal.
    ///
    /// ## Rules
    /// - `Percentage` rescales with the subtotal: `(subtotal × bps + 5000)
    ///   / 10000` in widened integer math (rounding at half a unit).
    /// - `Amount` is the flat value, unaffected by subtotal changes.
    ///
    /// ## Example
    /// ```rust
    /// use tukar_core::money::Money;
    /// use tukar_core::types::{Discount, DiscountRate};
    ///
    /// let pct = Discount::Percentage(DiscountRate::from_bps(1000)); // 10%
    /// assert_eq!(pct.amount_on(Money::from_rupiah(105_000)).rupiah(), 10_500);
    ///
    /// let flat = Discount::Amount(Money::from_rupiah(8_000));
    /// assert_eq!(flat.amount_on(Money::from_rupiah(105_000)).rupiah(), 8_000);
    /// ```
    pub fn amount_on(&self, subtotal: Money) -> Money {
        match self {
            Discount::Amount(amount) => *amount,
            Discount::Percentage(rate) => {
                // Use i128 to prevent overflow on large subtotals
                let amount = (subtotal.rupiah() as i128 * rate.bps() as i128 + 5000) / 10000;
                Money::from_rupiah(amount as i64)
            }
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the distributor's catalog, with its live stock counter.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown on forms and documents.
    pub name: String,

    /// Acquisition cost in rupiah.
    pub cost_rupiah: i64,

    /// Selling price in rupiah. Falls back to cost when absent.
    pub selling_price_rupiah: Option<i64>,

    /// Current stock level. Never negative.
    pub current_stock: i64,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the acquisition cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_rupiah(self.cost_rupiah)
    }

    /// The value a unit of this product carries in exchange math:
    /// the selling price, falling back to cost when no price is set.
    #[inline]
    pub fn unit_value(&self) -> Money {
        Money::from_rupiah(self.selling_price_rupiah.unwrap_or(self.cost_rupiah))
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An issued invoice. Mutated only through the sales module's own update
/// path or by the ExchangeManager.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub code: String,
    pub customer_name: String,
    pub subtotal_rupiah: i64,
    pub discount_kind: DiscountKind,
    /// Rupiah for [`DiscountKind::Amount`], basis points for
    /// [`DiscountKind::Percentage`].
    pub discount_value: i64,
    pub shipping_rupiah: i64,
    pub total_rupiah: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_rupiah(self.subtotal_rupiah)
    }

    /// Returns the shipping cost as Money.
    #[inline]
    pub fn shipping(&self) -> Money {
        Money::from_rupiah(self.shipping_rupiah)
    }

    /// Returns the total amount as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_rupiah(self.total_rupiah)
    }

    /// Resolves the stored kind/value pair into the [`Discount`] union.
    pub fn discount(&self) -> Discount {
        match self.discount_kind {
            DiscountKind::Amount => Discount::Amount(Money::from_rupiah(self.discount_value)),
            DiscountKind::Percentage => {
                Discount::Percentage(DiscountRate::from_bps(self.discount_value as u32))
            }
        }
    }

    /// The discount amount currently in effect, derived from the subtotal.
    #[inline]
    pub fn discount_amount(&self) -> Money {
        self.discount().amount_on(self.subtotal())
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// A line item on an invoice.
/// Uses the snapshot pattern to freeze pricing at time of billing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// Quantity still billed on this line. Exchanges decrement it; a line
    /// that reaches zero is removed.
    pub quantity: i64,
    /// Unit price in rupiah at time of billing (frozen).
    pub unit_price_rupiah: i64,
    /// Unit cost in rupiah at time of billing (frozen).
    pub unit_cost_rupiah: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InvoiceLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_rupiah(self.unit_price_rupiah)
    }

    /// Returns the line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Exchange Record
// =============================================================================

/// A committed goods exchange against one invoice.
///
/// `invoice_id` is fixed at creation; an edit can change every other
/// operator-facing field but never re-point the record at a different
/// invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExchangeRecord {
    pub id: String,
    /// Business code, e.g. `TG-20260807-0001`.
    pub code: String,
    pub invoice_id: String,
    #[ts(as = "String")]
    pub swap_date: NaiveDate,
    /// Invoice total immediately before this record's effect. The anchor
    /// for reversal and for every recomputation of this record.
    pub base_total_rupiah: i64,
    #[ts(as = "Option<String>")]
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Operator who created or last edited the record.
    pub created_by: String,
    /// Replacement value minus old value. Never negative (value floor).
    pub difference_rupiah: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRecord {
    /// Returns the base total as Money.
    #[inline]
    pub fn base_total(&self) -> Money {
        Money::from_rupiah(self.base_total_rupiah)
    }

    /// Returns the value difference as Money.
    #[inline]
    pub fn difference(&self) -> Money {
        Money::from_rupiah(self.difference_rupiah)
    }
}

// =============================================================================
// Exchange Detail
// =============================================================================

/// One old-item/replacement-item pair of an exchange record.
///
/// The stored quantities are exactly the deltas that were applied to the
/// invoice line and the stock counter, and the unit values are snapshots
/// taken at commit time. Reversal negates these rows; it never recomputes
/// from history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExchangeDetail {
    pub id: String,
    pub exchange_id: String,
    pub old_product_id: String,
    pub old_quantity: i64,
    /// Exchange-math value of one old unit (selling price falling back to
    /// cost) at commit time.
    pub old_unit_value_rupiah: i64,
    /// Billing price of the consumed invoice line at commit time. Reversal
    /// reinserts the line with these exact numbers when the line was
    /// consumed away completely.
    pub old_line_price_rupiah: i64,
    /// Billing cost of the consumed invoice line at commit time.
    pub old_line_cost_rupiah: i64,
    pub replacement_product_id: String,
    pub replacement_quantity: i64,
    pub replacement_unit_value_rupiah: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ExchangeDetail {
    /// Returns the old-item unit value as Money.
    #[inline]
    pub fn old_unit_value(&self) -> Money {
        Money::from_rupiah(self.old_unit_value_rupiah)
    }

    /// Returns the replacement-item unit value as Money.
    #[inline]
    pub fn replacement_unit_value(&self) -> Money {
        Money::from_rupiah(self.replacement_unit_value_rupiah)
    }

    /// Old-item value of this row (unit value × quantity).
    #[inline]
    pub fn old_value(&self) -> Money {
        self.old_unit_value().multiply_quantity(self.old_quantity)
    }

    /// Replacement-item value of this row (unit value × quantity).
    #[inline]
    pub fn replacement_value(&self) -> Money {
        self.replacement_unit_value()
            .multiply_quantity(self.replacement_quantity)
    }
}

// =============================================================================
// Drafts
// =============================================================================

/// One row of an exchange form: the old item being taken back and the
/// replacement item going out in its place.
///
/// Product ids are plain strings straight from the form; an empty string
/// means nothing was selected yet, which the validator reports instead of
/// the manager tripping over it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DraftRow {
    pub old_product_id: String,
    pub old_quantity: i64,
    pub replacement_product_id: String,
    pub replacement_quantity: i64,
}

/// An operator's proposed exchange, before validation and commit.
///
/// Carries everything a mutation needs explicitly, including the acting
/// operator (`actor_id`). There is no ambient session state anywhere in
/// the engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeDraft {
    /// Business code for the record. Required.
    pub code: String,
    /// Target invoice. Required; immutable once the record exists.
    pub invoice_id: String,
    /// Swap date. Required (None = the form field was left empty).
    #[ts(as = "Option<String>")]
    pub swap_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Operator performing the mutation.
    pub actor_id: String,
    /// Item rows. At least one is required.
    pub rows: Vec<DraftRow>,
}

// =============================================================================
// Unit Tests
// =============================================================================
