//! # Invoice Repository
//!
//! Database operations for invoices and their line items.
//!
//! ## Line Mutation Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Exchanges move quantity between invoice lines and stock:           │
//! │                                                                     │
//! │  old item     : line quantity −q   (row deleted when it hits 0)     │
//! │                 stock +q           (goods come back)                │
//! │  replacement  : line quantity +q   (row inserted when absent)       │
//! │                 stock −q           (goods go out)                   │
//! │                                                                     │
//! │  The decrement is guarded (WHERE quantity >= q): zero rows          │
//! │  affected means another exchange got there first and the caller     │
//! │  aborts the whole transaction.                                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are rewritten only with subtotal and total; the discount value
//! and shipping cost columns belong to the sales module and exchanges
//! never touch them.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tukar_core::{Invoice, InvoiceLine};

/// Columns of the invoices table, in struct order.
const INVOICE_COLUMNS: &str = "id, code, customer_name, subtotal_rupiah, discount_kind, \
     discount_value, shipping_rupiah, total_rupiah, created_at, updated_at";

/// Columns of the invoice_lines table, in struct order.
const LINE_COLUMNS: &str =
    "id, invoice_id, product_id, quantity, unit_price_rupiah, unit_cost_rupiah, created_at";

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets all line items of an invoice.
    pub async fn get_lines(&self, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_lines(&mut conn, invoice_id).await
    }

    /// Inserts an invoice (used by seeding and the sales module).
    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(code = %invoice.code, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, code, customer_name, subtotal_rupiah, discount_kind,
                discount_value, shipping_rupiah, total_rupiah,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.code)
        .bind(&invoice.customer_name)
        .bind(invoice.subtotal_rupiah)
        .bind(invoice.discount_kind)
        .bind(invoice.discount_value)
        .bind(invoice.shipping_rupiah)
        .bind(invoice.total_rupiah)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a line item (used by seeding and the sales module).
    pub async fn insert_line(&self, line: &InvoiceLine) -> DbResult<()> {
        debug!(invoice_id = %line.invoice_id, product_id = %line.product_id, "Inserting invoice line");

        sqlx::query(
            r#"
            INSERT INTO invoice_lines (
                id, invoice_id, product_id, quantity,
                unit_price_rupiah, unit_cost_rupiah, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&line.id)
        .bind(&line.invoice_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_rupiah)
        .bind(line.unit_cost_rupiah)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Fetches an invoice on an existing connection/transaction.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(invoice)
    }

    /// Fetches an invoice's lines on an existing connection/transaction.
    pub async fn fetch_lines(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = ?1 ORDER BY created_at"
        ))
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Fetches one line by invoice and product.
    pub async fn fetch_line(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        product_id: &str,
    ) -> DbResult<Option<InvoiceLine>> {
        let line = sqlx::query_as::<_, InvoiceLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = ?1 AND product_id = ?2"
        ))
        .bind(invoice_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(line)
    }

    /// Decrements a line's quantity, removing the row when it reaches
    /// zero.
    ///
    /// ## Returns
    /// * `Ok(true)` - quantity consumed
    /// * `Ok(false)` - the line is missing or carries less than
    ///   `quantity`; nothing was changed
    pub async fn try_consume_line(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(invoice_id = %invoice_id, product_id = %product_id, quantity = %quantity, "Consuming line quantity");

        let result = sqlx::query(
            r#"
            UPDATE invoice_lines
            SET quantity = quantity - ?3
            WHERE invoice_id = ?1 AND product_id = ?2 AND quantity >= ?3
            "#,
        )
        .bind(invoice_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        // A line fully consumed by the exchange disappears from the invoice.
        sqlx::query(
            "DELETE FROM invoice_lines WHERE invoice_id = ?1 AND product_id = ?2 AND quantity = 0",
        )
        .bind(invoice_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        Ok(true)
    }

    /// Increments a line's quantity, inserting the row when absent.
    ///
    /// ## Arguments
    /// * `unit_price_rupiah` / `unit_cost_rupiah` - billing snapshots for
    ///   a newly inserted row; ignored when the line already exists
    pub async fn grow_line(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price_rupiah: i64,
        unit_cost_rupiah: i64,
    ) -> DbResult<()> {
        debug!(invoice_id = %invoice_id, product_id = %product_id, quantity = %quantity, "Growing line quantity");

        let result = sqlx::query(
            r#"
            UPDATE invoice_lines
            SET quantity = quantity + ?3
            WHERE invoice_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(invoice_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    id, invoice_id, product_id, quantity,
                    unit_price_rupiah, unit_cost_rupiah, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(invoice_id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price_rupiah)
            .bind(unit_cost_rupiah)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Rewrites an invoice's subtotal and total.
    ///
    /// Discount value and shipping cost stay untouched; the discount
    /// *amount* is derived from the subtotal and the stored kind.
    pub async fn update_totals(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        subtotal_rupiah: i64,
        total_rupiah: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET subtotal_rupiah = ?2,
                total_rupiah = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(invoice_id)
        .bind(subtotal_rupiah)
        .bind(total_rupiah)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", invoice_id));
        }

        Ok(())
    }
}

/// Helper to generate a new invoice line ID.
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}
