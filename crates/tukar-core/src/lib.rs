//! # tukar-core: Pure Business Logic for the Goods-Exchange Engine
//!
//! This crate is the heart of the tukar guling (goods exchange) subsystem of
//! the beverage distribution dashboard. It contains all business logic as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Tukar Architecture                           │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │              Dashboard (out of scope here)                    │ │
//! │  │    exchange create form ──► edit form ──► delete dialog       │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                   │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                ★ tukar-core (THIS CRATE) ★                    │ │
//! │  │                                                               │ │
//! │  │  ┌──────────┐ ┌──────────────┐ ┌────────┐ ┌────────────┐     │ │
//! │  │  │  money   │ │ availability │ │ impact │ │ validation │     │ │
//! │  │  │  Money   │ │ old + repl.  │ │ totals │ │ rule checks│     │ │
//! │  │  │ Discount │ │   bounds     │ │ deltas │ │ violations │     │ │
//! │  │  └──────────┘ └──────────────┘ └────────┘ └────────────┘     │ │
//! │  │                                                               │ │
//! │  │  NO I/O • NO DATABASE • NO ASYNC • PURE FUNCTIONS             │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                   │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                 tukar-db (Database Layer)                     │ │
//! │  │     SQLite repositories + ExchangeManager transactions        │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Invoice, ExchangeRecord, drafts)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`availability`] - How much of each product is still swappable
//! - [`impact`] - Invoice subtotal/discount/total recomputation
//! - [`validation`] - Draft legality rules
//! - [`error`] - Violation types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, always
//! 2. **No I/O**: the database and the transaction protocol live in tukar-db
//! 3. **Integer Money**: all monetary values are whole rupiah (i64)
//! 4. **Explicit Errors**: violations are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod impact;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tukar_core::Money` instead of
// `use tukar_core::money::Money`

pub use availability::Availability;
pub use error::{ItemSide, Violation};
pub use impact::{ImpactSummary, ValuedItem};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of old/replacement rows in a single exchange draft.
///
/// ## Business Reason
/// An exchange form with hundreds of rows is a data-entry accident, not a
/// real swap. Can be made configurable per tenant later.
pub const MAX_EXCHANGE_ROWS: usize = 100;

/// Maximum quantity for a single old or replacement item row.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g. typing 1000 crates instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
