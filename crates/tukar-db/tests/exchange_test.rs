//! Integration tests for the exchange transaction manager.
//!
//! Each test runs against a fresh in-memory SQLite database with the
//! standard fixture: one invoice billing 10 units of "Teh Botol" at
//! Rp10.000 (subtotal Rp100.000, shipping Rp5.000) and a catalog with a
//! replacement product "Sprite" at Rp5.000.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use tukar_core::{
    DiscountKind, DraftRow, ExchangeDraft, Invoice, InvoiceLine, Money, Product, Violation,
};
use tukar_db::{Conflict, Database, DbConfig, ExchangeError};

// =============================================================================
// Fixture
// =============================================================================

struct Fixture {
    db: Database,
    invoice: Invoice,
    teh: Product,
    sprite: Product,
}

/// Builds the standard fixture. `discount_kind`/`discount_value` shape
/// the invoice's discount; the total is derived so the invariant
/// subtotal − discount + shipping = total holds.
async fn fixture(discount_kind: DiscountKind, discount_value: i64) -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let now = Utc::now();

    let teh = Product {
        id: Uuid::new_v4().to_string(),
        sku: "TBS-CRT-001".to_string(),
        name: "Teh Botol Sosro crate".to_string(),
        cost_rupiah: 8_000,
        selling_price_rupiah: Some(10_000),
        current_stock: 50,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let sprite = Product {
        id: Uuid::new_v4().to_string(),
        sku: "SPR-CRT-001".to_string(),
        name: "Sprite crate".to_string(),
        cost_rupiah: 4_000,
        selling_price_rupiah: Some(5_000),
        current_stock: 20,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&teh).await.unwrap();
    db.products().insert(&sprite).await.unwrap();

    let subtotal = 100_000;
    let shipping = 5_000;
    let discount = match discount_kind {
        DiscountKind::Amount => discount_value,
        DiscountKind::Percentage => subtotal * discount_value / 10_000,
    };
    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        code: "INV-0001".to_string(),
        customer_name: "Toko Sumber Rejeki".to_string(),
        subtotal_rupiah: subtotal,
        discount_kind,
        discount_value,
        shipping_rupiah: shipping,
        total_rupiah: subtotal - discount + shipping,
        created_at: now,
        updated_at: now,
    };
    db.invoices().insert(&invoice).await.unwrap();
    db.invoices()
        .insert_line(&InvoiceLine {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice.id.clone(),
            product_id: teh.id.clone(),
            quantity: 10,
            unit_price_rupiah: 10_000,
            unit_cost_rupiah: 8_000,
            created_at: now,
        })
        .await
        .unwrap();

    Fixture {
        db,
        invoice,
        teh,
        sprite,
    }
}

fn draft(invoice_id: &str, rows: Vec<DraftRow>) -> ExchangeDraft {
    ExchangeDraft {
        code: "TG-20260807-0001".to_string(),
        invoice_id: invoice_id.to_string(),
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

async fn stock_of(db: &Database, product_id: &str) -> i64 {
    db.products()
        .get_by_id(product_id)
        .await
        .unwrap()
        .unwrap()
        .current_stock
}

async fn line_quantity(db: &Database, invoice_id: &str, product_id: &str) -> Option<i64> {
    db.invoices()
        .get_lines(invoice_id)
        .await
        .unwrap()
        .into_iter()
        .find(|line| line.product_id == product_id)
        .map(|line| line.quantity)
}

async fn invoice_state(db: &Database, invoice_id: &str) -> Invoice {
    db.invoices().get_by_id(invoice_id).await.unwrap().unwrap()
}

/// Logical snapshot of everything an exchange may touch.
async fn snapshot(fx: &Fixture) -> (Vec<(String, i64, i64, i64)>, i64, i64, i64, i64) {
    let mut lines: Vec<(String, i64, i64, i64)> = fx
        .db
        .invoices()
        .get_lines(&fx.invoice.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| (l.product_id, l.quantity, l.unit_price_rupiah, l.unit_cost_rupiah))
        .collect();
    lines.sort();

    let invoice = invoice_state(&fx.db, &fx.invoice.id).await;
    (
        lines,
        invoice.subtotal_rupiah,
        invoice.total_rupiah,
        stock_of(&fx.db, &fx.teh.id).await,
        stock_of(&fx.db, &fx.sprite.id).await,
    )
}

// =============================================================================
// Discount-kind correctness
// =============================================================================

#[tokio::test]
async fn test_percentage_discount_recomputes_with_subtotal() {
    // Subtotal 100.000, 10% discount, shipping 5.000 → total 95.000.
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    assert_eq!(fx.invoice.total_rupiah, 95_000);

    // Swap old value 20.000 for replacement value 25.000.
    let record = fx
        .db
        .exchange_manager()
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();

    let invoice = invoice_state(&fx.db, &fx.invoice.id).await;
    assert_eq!(invoice.subtotal_rupiah, 105_000);
    assert_eq!(invoice.discount_amount().rupiah(), 10_500);
    assert_eq!(invoice.total_rupiah, 99_500);

    // The record anchors on the pre-exchange total.
    assert_eq!(record.base_total_rupiah, 95_000);
    assert_eq!(record.difference_rupiah, 5_000);

    // Lines and stock moved together: 2 crates of Teh Botol came back,
    // 5 crates of Sprite went out.
    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.teh.id).await, Some(8));
    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.sprite.id).await, Some(5));
    assert_eq!(stock_of(&fx.db, &fx.teh.id).await, 52);
    assert_eq!(stock_of(&fx.db, &fx.sprite.id).await, 15);
}

#[tokio::test]
async fn test_amount_discount_is_not_rescaled() {
    // Flat 8.000 discount → total 97.000 before the exchange.
    let fx = fixture(DiscountKind::Amount, 8_000).await;
    assert_eq!(fx.invoice.total_rupiah, 97_000);

    fx.db
        .exchange_manager()
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();

    let invoice = invoice_state(&fx.db, &fx.invoice.id).await;
    assert_eq!(invoice.subtotal_rupiah, 105_000);
    assert_eq!(invoice.discount_amount().rupiah(), 8_000);
    assert_eq!(invoice.total_rupiah, 102_000);
}

// =============================================================================
// Availability
// =============================================================================

#[tokio::test]
async fn test_availability_monotonicity_around_create_and_delete() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let before = manager
        .preview_availability(&fx.invoice.id, None)
        .await
        .unwrap();
    assert_eq!(before.old_items.get(&fx.teh.id), Some(&10));
    assert_eq!(before.replacement_items.get(&fx.sprite.id), Some(&20));

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();

    // Old availability drops by exactly the consumed quantity; the
    // replacement bound is stock plus allocation, which the exchange
    // itself leaves unchanged (15 in stock + 5 allocated).
    let during = manager
        .preview_availability(&fx.invoice.id, None)
        .await
        .unwrap();
    assert_eq!(during.old_items.get(&fx.teh.id), Some(&8));
    assert_eq!(during.replacement_items.get(&fx.sprite.id), Some(&20));

    manager.delete(&record.id).await.unwrap();

    let after = manager
        .preview_availability(&fx.invoice.id, None)
        .await
        .unwrap();
    assert_eq!(after.old_items.get(&fx.teh.id), Some(&10));
    assert_eq!(after.replacement_items.get(&fx.sprite.id), Some(&20));
}

#[tokio::test]
async fn test_exhausted_line_rejects_second_exchange() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    // Consume the whole Teh Botol line (value 100.000 vs 100.000).
    manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 10), (&fx.sprite.id, 20))],
        ))
        .await
        .unwrap();

    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.teh.id).await, None);
    let bounds = manager
        .preview_availability(&fx.invoice.id, None)
        .await
        .unwrap();
    assert_eq!(bounds.old_items.get(&fx.teh.id), None);

    // A second exchange on the same product must report availability 0.
    let err = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 1), (&fx.sprite.id, 2))],
        ))
        .await
        .unwrap_err();

    let violations = err.violations().expect("expected a validation failure");
    assert!(violations.contains(&Violation::InsufficientOldItem {
        product_id: fx.teh.id.clone(),
        available: 0,
        requested: 1,
    }));
}

#[tokio::test]
async fn test_fully_swapped_line_stays_editable() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 10), (&fx.sprite.id, 20))],
        ))
        .await
        .unwrap();

    // The edit form sees the full original quantity again.
    let bounds = manager
        .preview_availability(&fx.invoice.id, Some(&record.id))
        .await
        .unwrap();
    assert_eq!(bounds.old_items.get(&fx.teh.id), Some(&10));

    // Shrinking the exchange restores part of the line.
    manager
        .update(
            &record.id,
            &draft(&fx.invoice.id, vec![row((&fx.teh.id, 4), (&fx.sprite.id, 8))]),
        )
        .await
        .unwrap();

    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.teh.id).await, Some(6));
    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.sprite.id).await, Some(8));
    assert_eq!(stock_of(&fx.db, &fx.teh.id).await, 54);
    assert_eq!(stock_of(&fx.db, &fx.sprite.id).await, 12);

    // Value-neutral swap both times, so the invoice never moved.
    let invoice = invoice_state(&fx.db, &fx.invoice.id).await;
    assert_eq!(invoice.total_rupiah, 95_000);
}

// =============================================================================
// Reversal
// =============================================================================

#[tokio::test]
async fn test_delete_restores_pre_create_state_exactly() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let before = snapshot(&fx).await;

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();
    assert_ne!(snapshot(&fx).await, before);

    manager.delete(&record.id).await.unwrap();

    assert_eq!(snapshot(&fx).await, before);
    assert!(fx.db.exchanges().get_by_id(&record.id).await.unwrap().is_none());
    assert!(fx
        .db
        .exchanges()
        .list_by_invoice(&fx.invoice.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_edit_to_identical_draft_changes_nothing() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let d = draft(
        &fx.invoice.id,
        vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
    );
    let record = manager.create(&d).await.unwrap();
    let before = snapshot(&fx).await;

    let updated = manager.update(&record.id, &d).await.unwrap();

    assert_eq!(snapshot(&fx).await, before);
    assert_eq!(updated.base_total_rupiah, record.base_total_rupiah);
    assert_eq!(updated.difference_rupiah, record.difference_rupiah);
}

#[tokio::test]
async fn test_edit_reanchors_on_base_total() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();
    assert_eq!(invoice_state(&fx.db, &fx.invoice.id).await.total_rupiah, 99_500);

    // Re-draft to a value-neutral swap: 3 × 10.000 for 6 × 5.000. The
    // totals must return to the pre-exchange numbers, not drift from the
    // intermediate state.
    let updated = manager
        .update(
            &record.id,
            &draft(&fx.invoice.id, vec![row((&fx.teh.id, 3), (&fx.sprite.id, 6))]),
        )
        .await
        .unwrap();

    let invoice = invoice_state(&fx.db, &fx.invoice.id).await;
    assert_eq!(invoice.subtotal_rupiah, 100_000);
    assert_eq!(invoice.total_rupiah, 95_000);
    assert_eq!(updated.base_total_rupiah, 95_000);
    assert_eq!(updated.difference_rupiah, 0);

    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.teh.id).await, Some(7));
    assert_eq!(line_quantity(&fx.db, &fx.invoice.id, &fx.sprite.id).await, Some(6));
    assert_eq!(stock_of(&fx.db, &fx.teh.id).await, 53);
    assert_eq!(stock_of(&fx.db, &fx.sprite.id).await, 14);
}

// =============================================================================
// Value floor
// =============================================================================

#[tokio::test]
async fn test_value_floor_rejects_and_mutates_nothing() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();
    let before = snapshot(&fx).await;

    // Old 20.000 vs replacement 15.000.
    let err = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 3))],
        ))
        .await
        .unwrap_err();

    let violations = err.violations().expect("expected a validation failure");
    assert_eq!(
        violations,
        &[Violation::ValueFloor {
            old_value: Money::from_rupiah(20_000),
            replacement_value: Money::from_rupiah(15_000),
        }]
    );

    assert_eq!(snapshot(&fx).await, before);
    assert!(fx
        .db
        .exchanges()
        .list_by_invoice(&fx.invoice.id)
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Conflicts
// =============================================================================

#[tokio::test]
async fn test_commit_time_stock_shortfall_aborts_whole_transaction() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();
    let before = snapshot(&fx).await;

    // Each row alone fits the replacement bound (20), together they draw
    // 25 from a stock of 20. The per-row validator passes; the guarded
    // stock update inside the transaction must catch it and roll back.
    let err = manager
        .create(&draft(
            &fx.invoice.id,
            vec![
                row((&fx.teh.id, 2), (&fx.sprite.id, 15)),
                row((&fx.teh.id, 1), (&fx.sprite.id, 10)),
            ],
        ))
        .await
        .unwrap_err();

    match err {
        ExchangeError::Conflict(Conflict::InsufficientStock {
            product_id,
            available,
            requested,
        }) => {
            assert_eq!(product_id, fx.sprite.id);
            assert_eq!(available, 5);
            assert_eq!(requested, 10);
        }
        other => panic!("expected a stock conflict, got {other}"),
    }

    // No partial effect: the first row's movements were rolled back too.
    assert_eq!(snapshot(&fx).await, before);
    assert!(fx
        .db
        .exchanges()
        .list_by_invoice(&fx.invoice.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_dependent_return_note_blocks_delete() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();

    sqlx::query("INSERT INTO return_notes (id, code, exchange_id, created_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(Uuid::new_v4().to_string())
        .bind("RN-0001")
        .bind(&record.id)
        .bind(Utc::now())
        .execute(fx.db.pool())
        .await
        .unwrap();

    let err = manager.delete(&record.id).await.unwrap_err();
    match err {
        ExchangeError::Conflict(Conflict::DependentRecords {
            exchange_id,
            blockers,
        }) => {
            assert_eq!(exchange_id, record.id);
            assert_eq!(blockers, vec!["RN-0001".to_string()]);
        }
        other => panic!("expected a dependency conflict, got {other}"),
    }

    // The record survived; removing the dependent unblocks deletion.
    assert!(fx.db.exchanges().get_by_id(&record.id).await.unwrap().is_some());

    sqlx::query("DELETE FROM return_notes WHERE exchange_id = ?1")
        .bind(&record.id)
        .execute(fx.db.pool())
        .await
        .unwrap();
    manager.delete(&record.id).await.unwrap();
    assert!(fx.db.exchanges().get_by_id(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_record_and_invoice_are_conflicts() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let err = manager.delete("no-such-record").await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Conflict(Conflict::ExchangeNotFound(_))
    ));

    let err = manager
        .create(&draft("no-such-invoice", vec![row((&fx.teh.id, 1), (&fx.sprite.id, 2))]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Conflict(Conflict::InvoiceNotFound(_))
    ));
}

// =============================================================================
// Draft validation through the API
// =============================================================================

#[tokio::test]
async fn test_create_collects_all_draft_violations() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let mut bad = draft(&fx.invoice.id, vec![]);
    bad.code = String::new();
    bad.swap_date = None;

    let err = manager.create(&bad).await.unwrap_err();
    let violations = err.violations().expect("expected a validation failure");

    assert!(violations.contains(&Violation::MissingCode));
    assert!(violations.contains(&Violation::MissingSwapDate));
    assert!(violations.contains(&Violation::NoRows));
}

#[tokio::test]
async fn test_edit_cannot_move_record_to_another_invoice() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let record = manager
        .create(&draft(
            &fx.invoice.id,
            vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
        ))
        .await
        .unwrap();

    let other = Invoice {
        id: Uuid::new_v4().to_string(),
        code: "INV-0002".to_string(),
        customer_name: "Toko Maju".to_string(),
        subtotal_rupiah: 0,
        discount_kind: DiscountKind::Amount,
        discount_value: 0,
        shipping_rupiah: 0,
        total_rupiah: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    fx.db.invoices().insert(&other).await.unwrap();

    let err = manager
        .update(
            &record.id,
            &draft(&other.id, vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))]),
        )
        .await
        .unwrap_err();

    let violations = err.violations().expect("expected a validation failure");
    assert_eq!(
        violations,
        &[Violation::InvoiceImmutable {
            expected: fx.invoice.id.clone(),
            got: other.id.clone(),
        }]
    );
}

// =============================================================================
// Previews
// =============================================================================

#[tokio::test]
async fn test_preview_impact_matches_committed_effect() {
    let fx = fixture(DiscountKind::Percentage, 1_000).await;
    let manager = fx.db.exchange_manager();

    let d = draft(
        &fx.invoice.id,
        vec![row((&fx.teh.id, 2), (&fx.sprite.id, 5))],
    );

    let impact = manager.preview_impact(&fx.invoice.id, &d).await.unwrap();
    assert_eq!(impact.old_value.rupiah(), 20_000);
    assert_eq!(impact.replacement_value.rupiah(), 25_000);
    assert_eq!(impact.new_subtotal.rupiah(), 105_000);
    assert_eq!(impact.new_discount_amount.rupiah(), 10_500);
    assert_eq!(impact.new_total.rupiah(), 99_500);
    assert_eq!(impact.delta.rupiah(), 4_500);

    // The preview is read-only.
    assert_eq!(invoice_state(&fx.db, &fx.invoice.id).await.total_rupiah, 95_000);

    // Committing produces exactly the previewed numbers.
    manager.create(&d).await.unwrap();
    assert_eq!(invoice_state(&fx.db, &fx.invoice.id).await.total_rupiah, 99_500);
}
