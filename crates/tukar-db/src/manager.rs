//! # Exchange Transaction Manager
//!
//! The only component allowed to mutate shared state: invoice lines,
//! invoice totals, product stock and the exchange ledger move together
//! here, inside single atomic transactions.
//!
//! ## The Three Protocols
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  CREATE                                                             │
//! │    fresh reads ─► validate ─► impact ─► apply rows ─► totals        │
//! │    ─► insert record (base_total = invoice total before changes)     │
//! │                                                                     │
//! │  UPDATE (reverse-then-reapply)                                      │
//! │    load record ─► reverse own effect ─► re-read reversed state      │
//! │    ─► validate new draft ─► apply ─► same base_total, new details   │
//! │                                                                     │
//! │  DELETE (pure reversal)                                             │
//! │    dependency check ─► reverse own effect ─► remove rows            │
//! │                                                                     │
//! │  Every arrow runs on one transaction. A failure anywhere rolls      │
//! │  the whole operation back; no partial state is ever observable.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Availability and validation reads happen inside the same transaction
//! as the writes, so a caller-supplied preview can never smuggle stale
//! bounds past the commit. SQLite's single writer serializes mutating
//! transactions; the guarded updates in the repositories are the second
//! line of defense and turn lost races into typed conflicts.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Conflict, DbError, ExchangeError};
use crate::repository::exchange::ExchangeRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::product::ProductRepository;
use tukar_core::availability::{available_old, available_replacement, Availability};
use tukar_core::impact::{compute_impact, ImpactSummary, ValuedItem};
use tukar_core::validation::validate;
use tukar_core::{
    ExchangeDetail, ExchangeDraft, ExchangeRecord, Invoice, InvoiceLine, Money, Product, Violation,
};

// =============================================================================
// Exchange Manager
// =============================================================================

/// Transaction manager for goods-exchange records.
///
/// ## Usage
/// ```rust,ignore
/// let manager = db.exchange_manager();
///
/// let bounds = manager.preview_availability(&invoice_id, None).await?;
/// let impact = manager.preview_impact(&invoice_id, &draft).await?;
/// let record = manager.create(&draft).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ExchangeManager {
    pool: SqlitePool,
}

impl ExchangeManager {
    /// Creates a new ExchangeManager.
    pub fn new(pool: SqlitePool) -> Self {
        ExchangeManager { pool }
    }

    // =========================================================================
    // Previews (read-only)
    // =========================================================================

    /// Old-item and replacement-item bounds for an invoice.
    ///
    /// ## Arguments
    /// * `excluding` - record under edit, whose own consumption and
    ///   allocation are added back so the edit form can re-offer what the
    ///   record already holds
    ///
    /// Replacement bounds cover the whole active catalog; products only
    /// known to the excluded record (deactivated meanwhile) appear with
    /// their prior allocation.
    pub async fn preview_availability(
        &self,
        invoice_id: &str,
        excluding: Option<&str>,
    ) -> Result<Availability, ExchangeError> {
        let invoices = InvoiceRepository::new(self.pool.clone());
        let exchanges = ExchangeRepository::new(self.pool.clone());
        let products = ProductRepository::new(self.pool.clone());

        invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| Conflict::InvoiceNotFound(invoice_id.to_string()))?;

        let lines = invoices.get_lines(invoice_id).await?;
        let history = exchanges.list_details_by_invoice(invoice_id).await?;
        let catalog = products.list_active().await?;

        Ok(Availability {
            old_items: available_old(&lines, &history, excluding),
            replacement_items: available_replacement(&catalog, &history, excluding),
        })
    }

    /// Financial effect of a draft on the invoice as it stands right now
    /// (the create-path anchor).
    ///
    /// Lenient on incomplete drafts: rows without a product selected yet
    /// simply contribute nothing, so the form can live-preview while the
    /// operator is still typing.
    pub async fn preview_impact(
        &self,
        invoice_id: &str,
        draft: &ExchangeDraft,
    ) -> Result<ImpactSummary, ExchangeError> {
        let invoices = InvoiceRepository::new(self.pool.clone());

        let invoice = invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| Conflict::InvoiceNotFound(invoice_id.to_string()))?;

        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let products = Self::draft_products(&mut conn, draft).await?;
        let (old_items, replacement_items) = resolve_rows(draft, &products);

        Ok(compute_impact(&invoice, &old_items, &replacement_items))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Commits a new exchange: validates the draft against freshly-read
    /// availability, moves line quantities and stock, rewrites the
    /// invoice totals and persists the record, all atomically.
    pub async fn create(&self, draft: &ExchangeDraft) -> Result<ExchangeRecord, ExchangeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match Self::create_in(&mut tx, draft).await {
            Ok(record) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                info!(
                    id = %record.id,
                    code = %record.code,
                    invoice_id = %record.invoice_id,
                    difference = %record.difference(),
                    actor = %draft.actor_id,
                    "Exchange created"
                );
                Ok(record)
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(err)
            }
        }
    }

    /// Re-commits an existing exchange under a new draft: reverses the
    /// record's own current effect, then runs create-style logic for the
    /// new draft against the reversed state, reusing the stored base
    /// total. Both phases share one transaction; a failure in the second
    /// undoes the first.
    pub async fn update(
        &self,
        id: &str,
        draft: &ExchangeDraft,
    ) -> Result<ExchangeRecord, ExchangeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match Self::update_in(&mut tx, id, draft).await {
            Ok(record) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                info!(
                    id = %record.id,
                    code = %record.code,
                    invoice_id = %record.invoice_id,
                    difference = %record.difference(),
                    actor = %draft.actor_id,
                    "Exchange updated"
                );
                Ok(record)
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(err)
            }
        }
    }

    /// Reverses and removes an exchange: restores invoice lines, stock
    /// and totals to their pre-record state, then deletes the rows.
    /// Refuses when dependent return notes still reference the record;
    /// deleting those first is the caller's job.
    pub async fn delete(&self, id: &str) -> Result<(), ExchangeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match Self::delete_in(&mut tx, id).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                info!(id = %id, "Exchange deleted");
                Ok(())
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(err)
            }
        }
    }

    // =========================================================================
    // Transaction bodies
    // =========================================================================

    async fn create_in(
        conn: &mut SqliteConnection,
        draft: &ExchangeDraft,
    ) -> Result<ExchangeRecord, ExchangeError> {
        let invoice = match InvoiceRepository::fetch(conn, &draft.invoice_id).await? {
            Some(invoice) => invoice,
            None if draft.invoice_id.trim().is_empty() => {
                return Err(ExchangeError::Validation(vec![Violation::MissingInvoice]));
            }
            None => {
                return Err(Conflict::InvoiceNotFound(draft.invoice_id.clone()).into());
            }
        };

        let lines = InvoiceRepository::fetch_lines(conn, &invoice.id).await?;
        let history = ExchangeRepository::fetch_details_by_invoice(conn, &invoice.id).await?;
        let products = Self::draft_products(conn, draft).await?;

        Self::check_draft(draft, &lines, &history, &products)?;

        let (old_items, replacement_items) = resolve_rows(draft, &products);
        let impact = compute_impact(&invoice, &old_items, &replacement_items);

        let now = Utc::now();
        let record = ExchangeRecord {
            id: Uuid::new_v4().to_string(),
            code: draft.code.trim().to_string(),
            invoice_id: invoice.id.clone(),
            swap_date: draft
                .swap_date
                .ok_or_else(|| ExchangeError::Validation(vec![Violation::MissingSwapDate]))?,
            base_total_rupiah: invoice.total_rupiah,
            deadline: draft.deadline,
            notes: draft.notes.clone(),
            created_by: draft.actor_id.clone(),
            difference_rupiah: impact.item_delta.rupiah(),
            created_at: now,
            updated_at: now,
        };

        let details = Self::apply_rows(conn, &invoice.id, draft, &products, &record.id).await?;

        InvoiceRepository::update_totals(
            conn,
            &invoice.id,
            impact.new_subtotal.rupiah(),
            impact.new_total.rupiah(),
        )
        .await?;
        ExchangeRepository::insert_record(conn, &record).await?;
        ExchangeRepository::insert_details(conn, &details).await?;

        Ok(record)
    }

    async fn update_in(
        conn: &mut SqliteConnection,
        id: &str,
        draft: &ExchangeDraft,
    ) -> Result<ExchangeRecord, ExchangeError> {
        let record = ExchangeRepository::fetch_record(conn, id)
            .await?
            .ok_or_else(|| Conflict::ExchangeNotFound(id.to_string()))?;

        // The invoice is fixed at creation; an edit draft pointing
        // elsewhere is a broken form, not a re-assignment request.
        if !draft.invoice_id.trim().is_empty() && draft.invoice_id != record.invoice_id {
            return Err(ExchangeError::Validation(vec![Violation::InvoiceImmutable {
                expected: record.invoice_id.clone(),
                got: draft.invoice_id.clone(),
            }]));
        }

        let old_details = ExchangeRepository::fetch_details(conn, &record.id).await?;
        let invoice = InvoiceRepository::fetch(conn, &record.invoice_id)
            .await?
            .ok_or_else(|| Conflict::InvoiceNotFound(record.invoice_id.clone()))?;

        // Phase 1: physically reverse this record's own effect, so the
        // new draft is applied to the true pre-record state.
        Self::reverse_record(conn, &invoice, &record, &old_details).await?;
        ExchangeRepository::delete_details(conn, &record.id).await?;

        // Phase 2: create-style logic against the reversed state. The
        // reversed invoice total is exactly the stored base total, so
        // every edit stays anchored on the same pre-exchange numbers.
        let invoice = InvoiceRepository::fetch(conn, &record.invoice_id)
            .await?
            .ok_or_else(|| Conflict::InvoiceNotFound(record.invoice_id.clone()))?;
        let lines = InvoiceRepository::fetch_lines(conn, &invoice.id).await?;
        let history = ExchangeRepository::fetch_details_by_invoice(conn, &invoice.id).await?;
        let products = Self::draft_products(conn, draft).await?;

        Self::check_draft(draft, &lines, &history, &products)?;

        let (old_items, replacement_items) = resolve_rows(draft, &products);
        let impact = compute_impact(&invoice, &old_items, &replacement_items);

        let updated = ExchangeRecord {
            id: record.id.clone(),
            code: draft.code.trim().to_string(),
            invoice_id: record.invoice_id.clone(),
            swap_date: draft
                .swap_date
                .ok_or_else(|| ExchangeError::Validation(vec![Violation::MissingSwapDate]))?,
            base_total_rupiah: record.base_total_rupiah,
            deadline: draft.deadline,
            notes: draft.notes.clone(),
            created_by: record.created_by.clone(),
            difference_rupiah: impact.item_delta.rupiah(),
            created_at: record.created_at,
            updated_at: Utc::now(),
        };

        let details = Self::apply_rows(conn, &invoice.id, draft, &products, &updated.id).await?;

        InvoiceRepository::update_totals(
            conn,
            &invoice.id,
            impact.new_subtotal.rupiah(),
            impact.new_total.rupiah(),
        )
        .await?;
        ExchangeRepository::update_record(conn, &updated).await?;
        ExchangeRepository::insert_details(conn, &details).await?;

        Ok(updated)
    }

    async fn delete_in(conn: &mut SqliteConnection, id: &str) -> Result<(), ExchangeError> {
        let record = ExchangeRepository::fetch_record(conn, id)
            .await?
            .ok_or_else(|| Conflict::ExchangeNotFound(id.to_string()))?;

        let blockers = ExchangeRepository::dependent_return_notes(conn, &record.id).await?;
        if !blockers.is_empty() {
            return Err(Conflict::DependentRecords {
                exchange_id: record.id.clone(),
                blockers,
            }
            .into());
        }

        let details = ExchangeRepository::fetch_details(conn, &record.id).await?;
        let invoice = InvoiceRepository::fetch(conn, &record.invoice_id)
            .await?
            .ok_or_else(|| Conflict::InvoiceNotFound(record.invoice_id.clone()))?;

        Self::reverse_record(conn, &invoice, &record, &details).await?;

        ExchangeRepository::delete_details(conn, &record.id).await?;
        ExchangeRepository::delete_record(conn, &record.id).await?;

        Ok(())
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// Runs the pure validator against bounds derived from the
    /// freshly-read state on this transaction.
    ///
    /// The edit path never needs the calculators' excluding parameter
    /// here: by the time it validates, the record's effect is physically
    /// reversed and its detail rows are gone, so the plain create-mode
    /// bounds are the correct ones.
    fn check_draft(
        draft: &ExchangeDraft,
        lines: &[InvoiceLine],
        history: &[ExchangeDetail],
        products: &HashMap<String, Product>,
    ) -> Result<(), ExchangeError> {
        let unit_values: HashMap<String, Money> = products
            .values()
            .map(|product| (product.id.clone(), product.unit_value()))
            .collect();
        let catalog: Vec<Product> = products.values().cloned().collect();

        let old_bounds = available_old(lines, history, None);
        let replacement_bounds = available_replacement(&catalog, history, None);

        validate(draft, &old_bounds, &replacement_bounds, &unit_values)
            .map_err(ExchangeError::Validation)
    }

    /// Applies every draft row: consumes the old-item line and returns
    /// its goods to stock, grows the replacement line and draws its
    /// goods from stock. Returns the detail rows with their snapshots.
    async fn apply_rows(
        conn: &mut SqliteConnection,
        invoice_id: &str,
        draft: &ExchangeDraft,
        products: &HashMap<String, Product>,
        exchange_id: &str,
    ) -> Result<Vec<ExchangeDetail>, ExchangeError> {
        let now = Utc::now();
        let mut details = Vec::with_capacity(draft.rows.len());

        for row in &draft.rows {
            let old_product = products
                .get(&row.old_product_id)
                .ok_or_else(|| DbError::not_found("Product", &row.old_product_id))?;
            let replacement_product = products
                .get(&row.replacement_product_id)
                .ok_or_else(|| DbError::not_found("Product", &row.replacement_product_id))?;

            // Old side: the billed line shrinks, the goods come back.
            let line = InvoiceRepository::fetch_line(conn, invoice_id, &row.old_product_id)
                .await?
                .ok_or_else(|| Conflict::InsufficientLineQuantity {
                    product_id: row.old_product_id.clone(),
                    available: 0,
                    requested: row.old_quantity,
                })?;
            if !InvoiceRepository::try_consume_line(
                conn,
                invoice_id,
                &row.old_product_id,
                row.old_quantity,
            )
            .await?
            {
                return Err(Conflict::InsufficientLineQuantity {
                    product_id: row.old_product_id.clone(),
                    available: line.quantity,
                    requested: row.old_quantity,
                }
                .into());
            }
            Self::adjust_stock_or_conflict(conn, &row.old_product_id, row.old_quantity).await?;

            // Replacement side: the line grows, the goods go out.
            InvoiceRepository::grow_line(
                conn,
                invoice_id,
                &row.replacement_product_id,
                row.replacement_quantity,
                replacement_product.unit_value().rupiah(),
                replacement_product.cost_rupiah,
            )
            .await?;
            Self::adjust_stock_or_conflict(
                conn,
                &row.replacement_product_id,
                -row.replacement_quantity,
            )
            .await?;

            details.push(ExchangeDetail {
                id: Uuid::new_v4().to_string(),
                exchange_id: exchange_id.to_string(),
                old_product_id: row.old_product_id.clone(),
                old_quantity: row.old_quantity,
                old_unit_value_rupiah: old_product.unit_value().rupiah(),
                old_line_price_rupiah: line.unit_price_rupiah,
                old_line_cost_rupiah: line.unit_cost_rupiah,
                replacement_product_id: row.replacement_product_id.clone(),
                replacement_quantity: row.replacement_quantity,
                replacement_unit_value_rupiah: replacement_product.unit_value().rupiah(),
                created_at: now,
            });
        }

        Ok(details)
    }

    /// Negates a record's stored detail deltas and restores the invoice
    /// totals from the stored anchor. `invoice` is the pre-reversal row.
    async fn reverse_record(
        conn: &mut SqliteConnection,
        invoice: &Invoice,
        record: &ExchangeRecord,
        details: &[ExchangeDetail],
    ) -> Result<(), ExchangeError> {
        debug!(id = %record.id, details = details.len(), "Reversing exchange effect");

        for detail in details {
            // Replacement side back: the replacement line shrinks again
            // and its goods return to stock. The line can fall short if a
            // later exchange consumed it as an old item; that exchange
            // must be unwound first.
            if !InvoiceRepository::try_consume_line(
                conn,
                &record.invoice_id,
                &detail.replacement_product_id,
                detail.replacement_quantity,
            )
            .await?
            {
                let available =
                    InvoiceRepository::fetch_line(conn, &record.invoice_id, &detail.replacement_product_id)
                        .await?
                        .map(|line| line.quantity)
                        .unwrap_or(0);
                return Err(Conflict::InsufficientLineQuantity {
                    product_id: detail.replacement_product_id.clone(),
                    available,
                    requested: detail.replacement_quantity,
                }
                .into());
            }
            Self::adjust_stock_or_conflict(
                conn,
                &detail.replacement_product_id,
                detail.replacement_quantity,
            )
            .await?;

            // Old side back: the original line returns with its exact
            // billing snapshots, the returned goods leave stock again.
            // Stock can fall short if the returned goods were sold in the
            // meantime.
            InvoiceRepository::grow_line(
                conn,
                &record.invoice_id,
                &detail.old_product_id,
                detail.old_quantity,
                detail.old_line_price_rupiah,
                detail.old_line_cost_rupiah,
            )
            .await?;
            Self::adjust_stock_or_conflict(conn, &detail.old_product_id, -detail.old_quantity)
                .await?;
        }

        let reversed_subtotal = invoice.subtotal_rupiah - record.difference_rupiah;
        InvoiceRepository::update_totals(
            conn,
            &record.invoice_id,
            reversed_subtotal,
            record.base_total_rupiah,
        )
        .await?;

        Ok(())
    }

    /// Applies a stock delta or reports why it cannot be applied.
    async fn adjust_stock_or_conflict(
        conn: &mut SqliteConnection,
        product_id: &str,
        delta: i64,
    ) -> Result<(), ExchangeError> {
        if ProductRepository::try_adjust_stock(conn, product_id, delta).await? {
            return Ok(());
        }

        match ProductRepository::stock_of(conn, product_id).await? {
            None => Err(DbError::not_found("Product", product_id).into()),
            Some(available) => Err(Conflict::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested: delta.abs(),
            }
            .into()),
        }
    }

    /// Loads every product a draft references, keyed by id. Unknown ids
    /// are simply absent; the validator reports them.
    async fn draft_products(
        conn: &mut SqliteConnection,
        draft: &ExchangeDraft,
    ) -> Result<HashMap<String, Product>, ExchangeError> {
        let mut ids: Vec<String> = draft
            .rows
            .iter()
            .flat_map(|row| {
                [
                    row.old_product_id.clone(),
                    row.replacement_product_id.clone(),
                ]
            })
            .filter(|id| !id.trim().is_empty())
            .collect();
        ids.sort();
        ids.dedup();

        let products = ProductRepository::fetch_many(conn, &ids).await?;
        Ok(products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect())
    }
}

/// Resolves draft rows against the catalog into valued old/replacement
/// item lists. Rows without a known product or a positive quantity
/// contribute nothing; after validation has passed, every row resolves.
fn resolve_rows(
    draft: &ExchangeDraft,
    products: &HashMap<String, Product>,
) -> (Vec<ValuedItem>, Vec<ValuedItem>) {
    let mut old_items = Vec::with_capacity(draft.rows.len());
    let mut replacement_items = Vec::with_capacity(draft.rows.len());

    for row in &draft.rows {
        if row.old_quantity > 0 {
            if let Some(product) = products.get(&row.old_product_id) {
                old_items.push(ValuedItem {
                    product_id: product.id.clone(),
                    quantity: row.old_quantity,
                    unit_value: product.unit_value(),
                });
            }
        }
        if row.replacement_quantity > 0 {
            if let Some(product) = products.get(&row.replacement_product_id) {
                replacement_items.push(ValuedItem {
                    product_id: product.id.clone(),
                    quantity: row.replacement_quantity,
                    unit_value: product.unit_value(),
                });
            }
        }
    }

    (old_items, replacement_items)
}
