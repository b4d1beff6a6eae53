//! # tukar-db: Database Layer for the Goods-Exchange Engine
//!
//! This crate provides storage and the transactional mutation protocol
//! for the tukar guling subsystem. It uses SQLite with sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Tukar Data Flow                              │
//! │                                                                     │
//! │  Dashboard backend (createExchange, previewAvailability, ...)       │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                    tukar-db (THIS CRATE)                      │ │
//! │  │                                                               │ │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌────────────────────┐    │ │
//! │  │  │  Database  │  │ Repositories │  │  ExchangeManager   │    │ │
//! │  │  │ (pool.rs)  │  │ invoice.rs   │  │  create / update / │    │ │
//! │  │  │ SqlitePool │◄─│ product.rs   │◄─│  delete, previews, │    │ │
//! │  │  │ Migrations │  │ exchange.rs  │  │  atomic reversal   │    │ │
//! │  │  └────────────┘  └──────────────┘  └────────────────────┘    │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database (WAL, foreign keys on)                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - DbError, Conflict and the ExchangeError union
//! - [`repository`] - Repository implementations (invoice, product, exchange)
//! - [`manager`] - The exchange transaction manager
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tukar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tukar.db")).await?;
//!
//! let bounds = db.exchange_manager()
//!     .preview_availability(&invoice_id, None)
//!     .await?;
//! let record = db.exchange_manager().create(&draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{Conflict, DbError, ExchangeError};
pub use manager::ExchangeManager;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::exchange::ExchangeRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::product::ProductRepository;
