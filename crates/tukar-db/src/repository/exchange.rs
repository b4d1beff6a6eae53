//! # Exchange Repository
//!
//! Persistence for exchange records and their detail rows.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Exchange Record Lifecycle                        │
//! │                                                                     │
//! │  {Proposed} --create--> {Committed} --edit--> {Committed}           │
//! │                              │                                      │
//! │                              └──delete──> {Reversed/Removed}        │
//! │                                                                     │
//! │  No in-flight state is ever observable: every arrow is one atomic   │
//! │  transaction driven by the ExchangeManager. This repository only    │
//! │  moves rows; it never decides anything.                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tukar_core::{ExchangeDetail, ExchangeRecord};

/// Columns of the exchange_records table, in struct order.
const RECORD_COLUMNS: &str = "id, code, invoice_id, swap_date, base_total_rupiah, deadline, \
     notes, created_by, difference_rupiah, created_at, updated_at";

/// Columns of the exchange_details table, in struct order.
const DETAIL_COLUMNS: &str = "id, exchange_id, old_product_id, old_quantity, \
     old_unit_value_rupiah, old_line_price_rupiah, old_line_cost_rupiah, \
     replacement_product_id, replacement_quantity, replacement_unit_value_rupiah, created_at";

/// Repository for exchange-ledger database operations.
///
/// Reads are available on the pool; every mutation takes
/// `&mut SqliteConnection` and therefore only ever runs inside the
/// ExchangeManager's transaction.
#[derive(Debug, Clone)]
pub struct ExchangeRepository {
    pool: SqlitePool,
}

impl ExchangeRepository {
    /// Creates a new ExchangeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExchangeRepository { pool }
    }

    /// Gets an exchange record by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ExchangeRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_record(&mut conn, id).await
    }

    /// Gets the detail rows of an exchange record.
    pub async fn get_details(&self, exchange_id: &str) -> DbResult<Vec<ExchangeDetail>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_details(&mut conn, exchange_id).await
    }

    /// Lists all exchange records attached to an invoice, oldest first.
    pub async fn list_by_invoice(&self, invoice_id: &str) -> DbResult<Vec<ExchangeRecord>> {
        let records = sqlx::query_as::<_, ExchangeRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM exchange_records WHERE invoice_id = ?1 ORDER BY created_at"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Lists every detail row of every exchange attached to an invoice.
    /// This is the full history the availability calculator consumes.
    pub async fn list_details_by_invoice(
        &self,
        invoice_id: &str,
    ) -> DbResult<Vec<ExchangeDetail>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_details_by_invoice(&mut conn, invoice_id).await
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Fetches a record on an existing connection/transaction.
    pub async fn fetch_record(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<ExchangeRecord>> {
        let record = sqlx::query_as::<_, ExchangeRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM exchange_records WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record)
    }

    /// Fetches a record's details on an existing connection/transaction.
    pub async fn fetch_details(
        conn: &mut SqliteConnection,
        exchange_id: &str,
    ) -> DbResult<Vec<ExchangeDetail>> {
        let details = sqlx::query_as::<_, ExchangeDetail>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM exchange_details WHERE exchange_id = ?1 ORDER BY created_at"
        ))
        .bind(exchange_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(details)
    }

    /// Fetches the invoice's full exchange history.
    pub async fn fetch_details_by_invoice(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<ExchangeDetail>> {
        let details = sqlx::query_as::<_, ExchangeDetail>(
            r#"
            SELECT d.id, d.exchange_id, d.old_product_id, d.old_quantity,
                   d.old_unit_value_rupiah, d.old_line_price_rupiah, d.old_line_cost_rupiah,
                   d.replacement_product_id, d.replacement_quantity,
                   d.replacement_unit_value_rupiah, d.created_at
            FROM exchange_details d
            INNER JOIN exchange_records r ON r.id = d.exchange_id
            WHERE r.invoice_id = ?1
            ORDER BY d.created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(details)
    }

    /// Inserts a record row.
    pub async fn insert_record(
        conn: &mut SqliteConnection,
        record: &ExchangeRecord,
    ) -> DbResult<()> {
        debug!(id = %record.id, code = %record.code, "Inserting exchange record");

        sqlx::query(
            r#"
            INSERT INTO exchange_records (
                id, code, invoice_id, swap_date, base_total_rupiah,
                deadline, notes, created_by, difference_rupiah,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.code)
        .bind(&record.invoice_id)
        .bind(record.swap_date)
        .bind(record.base_total_rupiah)
        .bind(record.deadline)
        .bind(&record.notes)
        .bind(&record.created_by)
        .bind(record.difference_rupiah)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts detail rows.
    pub async fn insert_details(
        conn: &mut SqliteConnection,
        details: &[ExchangeDetail],
    ) -> DbResult<()> {
        for detail in details {
            sqlx::query(
                r#"
                INSERT INTO exchange_details (
                    id, exchange_id, old_product_id, old_quantity,
                    old_unit_value_rupiah, old_line_price_rupiah, old_line_cost_rupiah,
                    replacement_product_id, replacement_quantity,
                    replacement_unit_value_rupiah, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&detail.id)
            .bind(&detail.exchange_id)
            .bind(&detail.old_product_id)
            .bind(detail.old_quantity)
            .bind(detail.old_unit_value_rupiah)
            .bind(detail.old_line_price_rupiah)
            .bind(detail.old_line_cost_rupiah)
            .bind(&detail.replacement_product_id)
            .bind(detail.replacement_quantity)
            .bind(detail.replacement_unit_value_rupiah)
            .bind(detail.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Rewrites a record's operator-facing fields and its difference.
    /// `invoice_id` and `base_total_rupiah` are deliberately not part of
    /// the statement: the invoice is non-reassignable and the anchor
    /// never moves.
    pub async fn update_record(
        conn: &mut SqliteConnection,
        record: &ExchangeRecord,
    ) -> DbResult<()> {
        debug!(id = %record.id, code = %record.code, "Updating exchange record");

        sqlx::query(
            r#"
            UPDATE exchange_records
            SET code = ?2,
                swap_date = ?3,
                deadline = ?4,
                notes = ?5,
                difference_rupiah = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&record.id)
        .bind(&record.code)
        .bind(record.swap_date)
        .bind(record.deadline)
        .bind(&record.notes)
        .bind(record.difference_rupiah)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Removes all detail rows of a record.
    pub async fn delete_details(conn: &mut SqliteConnection, exchange_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM exchange_details WHERE exchange_id = ?1")
            .bind(exchange_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Removes a record row.
    pub async fn delete_record(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting exchange record");

        sqlx::query("DELETE FROM exchange_records WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Codes of return notes still referencing an exchange. Non-empty
    /// means deletion is blocked until the caller removes them.
    pub async fn dependent_return_notes(
        conn: &mut SqliteConnection,
        exchange_id: &str,
    ) -> DbResult<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT code FROM return_notes WHERE exchange_id = ?1 ORDER BY created_at",
        )
        .bind(exchange_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(codes)
    }
}

/// Generates an exchange code in format: TG-YYYYMMDD-NNNN
///
/// ## Format
/// - TG: tukar guling
/// - YYYYMMDD: date
/// - NNNN: sequence (padded to 4 digits)
///
/// ## Example
/// `TG-20260807-0412`
pub fn generate_exchange_code() -> String {
    let now = Utc::now();
    // Timestamp milliseconds as sequence; operators overwrite the code
    // when their depot uses its own numbering.
    let seq = (now.timestamp_millis() % 10_000) as u32;
    format!("TG-{}-{:04}", now.format("%Y%m%d"), seq)
}

/// Generates a new exchange detail ID.
pub fn generate_detail_id() -> String {
    Uuid::new_v4().to_string()
}
