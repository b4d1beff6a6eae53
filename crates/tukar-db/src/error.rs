//! # Database and Exchange Error Types
//!
//! Error types for storage operations and the exchange mutation API.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                │
//! │                                                                     │
//! │  SQLite Error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DbError (this module) ← adds context and categorization            │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ExchangeError ← Validation | Conflict | Storage, the discriminated │
//! │       │          result the mutation API returns                    │
//! │       ▼                                                             │
//! │  Dashboard displays the per-field / per-conflict message            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The three-way split follows the retry semantics: `Validation` never
//! mutated anything and is safe to retry after fixing the draft;
//! `Conflict` means state moved between preview and commit, re-fetch and
//! retry is the caller's decision; `Storage` is infrastructure, nothing
//! partial persisted.

use thiserror::Error;
use tukar_core::Violation;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU, invoice code or exchange code
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. the non-negative stock floor).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction begin/commit failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // CHECK constraint: "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Conflict
// =============================================================================

/// State moved between preview and commit, or a dependent record blocks
/// the operation. The whole transaction was rolled back; nothing partial
/// persisted. The caller should re-fetch availability and decide whether
/// to retry.
#[derive(Debug, Error)]
pub enum Conflict {
    /// A replacement draw (or an old-item give-back reversal) would push
    /// stock below zero.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// An invoice line no longer carries the quantity the operation needs.
    #[error("insufficient invoice quantity for {product_id}: available {available}, requested {requested}")]
    InsufficientLineQuantity {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The target invoice vanished between preview and commit.
    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),

    /// The exchange record vanished (or never existed).
    #[error("exchange record not found: {0}")]
    ExchangeNotFound(String),

    /// Return/credit notes still reference the exchange. The caller must
    /// delete the dependents first; this engine never cascades.
    #[error("exchange {} is blocked by dependent return notes: {}", .exchange_id, .blockers.join(", "))]
    DependentRecords {
        exchange_id: String,
        blockers: Vec<String>,
    },
}

// =============================================================================
// ExchangeError
// =============================================================================

/// The discriminated failure value of the exchange mutation API.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The draft breaks one or more legality rules. Nothing was mutated;
    /// fix the draft and retry. Each violation carries a machine-readable
    /// reason (the variant) and a human-readable message (its Display).
    #[error("exchange draft is invalid ({} violation(s))", .0.len())]
    Validation(Vec<Violation>),

    /// State changed underneath the operation; the transaction was
    /// aborted entirely.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// Infrastructure failure; no partial effect persists.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl ExchangeError {
    /// The violations behind a `Validation` failure, if that is what this
    /// is. Convenience for callers rendering per-field errors.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            ExchangeError::Validation(violations) => Some(violations),
            _ => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages() {
        let conflict = Conflict::InsufficientStock {
            product_id: "p-sprite".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            conflict.to_string(),
            "insufficient stock for p-sprite: available 2, requested 5"
        );

        let conflict = Conflict::DependentRecords {
            exchange_id: "x1".to_string(),
            blockers: vec!["RN-001".to_string(), "RN-002".to_string()],
        };
        assert_eq!(
            conflict.to_string(),
            "exchange x1 is blocked by dependent return notes: RN-001, RN-002"
        );
    }

    #[test]
    fn test_validation_error_counts() {
        let err = ExchangeError::Validation(vec![Violation::MissingCode]);
        assert_eq!(err.to_string(), "exchange draft is invalid (1 violation(s))");
        assert_eq!(err.violations().unwrap().len(), 1);
    }
}
