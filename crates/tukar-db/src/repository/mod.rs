//! # Repository Module
//!
//! Database repository implementations for the exchange engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ExchangeManager / dashboard backend                                │
//! │       │                                                             │
//! │       │  db.invoices().get_by_id(id)                                │
//! │       │  InvoiceRepository::try_consume_line(&mut *tx, ...)         │
//! │       ▼                                                             │
//! │  Repository (SQL isolated in one place)                             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite Database                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository exposes pool-based reads for callers and
//! connection-based helpers for mutations, so every write can be forced
//! into the ExchangeManager's transaction.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - catalog reads and guarded stock deltas
//! - [`invoice::InvoiceRepository`] - invoice/line reads, line consumption
//!   and growth, totals rewrite
//! - [`exchange::ExchangeRepository`] - exchange ledger rows and the
//!   dependent-return-note check

pub mod exchange;
pub mod invoice;
pub mod product;
