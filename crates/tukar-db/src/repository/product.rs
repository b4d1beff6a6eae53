//! # Product Repository
//!
//! Database operations for the product catalog and its stock counters.
//!
//! ## Stock Mutation Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: absolute update (clobbers concurrent writers)            │
//! │     UPDATE products SET current_stock = 7 WHERE id = ?              │
//! │                                                                     │
//! │  ✅ CORRECT: guarded delta update                                   │
//! │     UPDATE products                                                 │
//! │     SET current_stock = current_stock + ?delta                      │
//! │     WHERE id = ? AND current_stock + ?delta >= 0                    │
//! │                                                                     │
//! │  Zero rows affected = the non-negative floor would be violated      │
//! │  (or the product is gone); the caller turns that into a conflict    │
//! │  and the surrounding transaction rolls back.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock-mutating helpers take `&mut SqliteConnection` so they always run
//! inside the caller's transaction; there is no pool-based stock writer.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tukar_core::Product;

/// Columns of the products table, in struct order.
const PRODUCT_COLUMNS: &str = "id, sku, name, cost_rupiah, selling_price_rupiah, \
     current_stock, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets several products at once.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_many(&mut conn, ids).await
    }

    /// Lists active products, ordered by name.
    ///
    /// ## Usage
    /// Feeds the replacement-item availability preview, which covers the
    /// whole sellable catalog.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, cost_rupiah, selling_price_rupiah,
                current_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.cost_rupiah)
        .bind(product.selling_price_rupiah)
        .bind(product.current_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Fetches several products on an existing connection/transaction.
    pub async fn fetch_many(conn: &mut SqliteConnection, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, Product>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&mut *conn).await?)
    }

    /// Reads the current stock of a product inside a transaction.
    ///
    /// ## Returns
    /// * `Ok(None)` - product does not exist
    pub async fn stock_of(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(stock)
    }

    /// Applies a signed stock delta with a non-negative floor.
    ///
    /// ## Arguments
    /// * `delta` - positive for goods coming back, negative for goods
    ///   going out
    ///
    /// ## Returns
    /// * `Ok(true)` - delta applied
    /// * `Ok(false)` - floor would be violated, or the product is gone;
    ///   nothing was changed. Use [`Self::stock_of`] to tell the two
    ///   apart and report the available quantity.
    pub async fn try_adjust_stock(
        conn: &mut SqliteConnection,
        id: &str,
        delta: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?2,
                updated_at = ?3
            WHERE id = ?1 AND current_stock + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
