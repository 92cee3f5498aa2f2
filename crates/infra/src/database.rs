//! PostgreSQL integration
//!
//! Connects the optional database pool at startup and provides a
//! [`ProductStore`] backed by the `products` table.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE products (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     price       BIGINT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     seq         BIGSERIAL
//! );
//! ```

use async_trait::async_trait;
use bulkbuy_core::config::DatabaseSettings;
use bulkbuy_core::{BulkbuyError, Product, ProductId, ProductStore, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Connect to the configured database.
///
/// Returns `Ok(None)` when no URL is configured. A connection failure is
/// logged and also yields `Ok(None)` unless `fail_fast` is set, in which case
/// the error is returned and startup should abort.
pub async fn integrate(settings: &DatabaseSettings) -> Result<Option<PgPool>> {
    let Some(url) = settings.url.as_deref() else {
        info!("No database configured, using the in-memory catalog");
        return Ok(None);
    };

    let connected = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(url)
        .await;

    match connected {
        Ok(pool) => {
            info!("Bulkbuy database integration successful");
            Ok(Some(pool))
        }
        Err(e) if settings.fail_fast => Err(BulkbuyError::database(format!(
            "Bulkbuy database integration failed: {}",
            e
        ))),
        Err(e) => {
            error!(error = %e, "Bulkbuy database integration failed");
            Ok(None)
        }
    }
}

/// Escape `LIKE` metacharacters so the keyword is matched literally
pub fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Product catalog stored in PostgreSQL
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `products` table when it does not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS products (
                seq BIGSERIAL,
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price BIGINT NOT NULL CHECK (price >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
        "#;

        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| BulkbuyError::database(format!("Failed to create products table: {}", e)))?;
        Ok(())
    }

    fn product_from_row(row: &PgRow) -> Result<Product> {
        let id: Uuid = row
            .try_get("id")
            .map_err(|e| BulkbuyError::database(format!("Failed to get id: {}", e)))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| BulkbuyError::database(format!("Failed to get name: {}", e)))?;
        let description: String = row
            .try_get("description")
            .map_err(|e| BulkbuyError::database(format!("Failed to get description: {}", e)))?;
        let price: i64 = row
            .try_get("price")
            .map_err(|e| BulkbuyError::database(format!("Failed to get price: {}", e)))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| BulkbuyError::database(format!("Failed to get created_at: {}", e)))?;

        Ok(Product {
            id: ProductId(id),
            name,
            description,
            price,
            created_at,
        })
    }

    fn products_from_rows(rows: &[PgRow]) -> Result<Vec<Product>> {
        rows.iter().map(Self::product_from_row).collect()
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> Result<Vec<Product>> {
        let query = r#"
            SELECT id, name, description, price, created_at
            FROM products
            ORDER BY seq
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BulkbuyError::database(format!("Failed to list products: {}", e)))?;

        Self::products_from_rows(&rows)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let query = r#"
            SELECT id, name, description, price, created_at
            FROM products
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BulkbuyError::database(format!("Failed to get product: {}", e)))?;

        row.as_ref().map(Self::product_from_row).transpose()
    }

    async fn insert(&self, product: Product) -> Result<Product> {
        let query = r#"
            INSERT INTO products (id, name, description, price, created_at)
            VALUES ($1, $2, $3, $4, $5)
        "#;

        sqlx::query(query)
            .bind(product.id.0)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    BulkbuyError::conflict(format!("product {} already exists", product.id))
                }
                other => BulkbuyError::database(format!("Failed to insert product: {}", other)),
            })?;

        debug!(product_id = %product.id, "Inserted product");
        Ok(product)
    }

    async fn find_by_name(&self, keyword: &str) -> Result<Vec<Product>> {
        let query = r#"
            SELECT id, name, description, price, created_at
            FROM products
            WHERE name ILIKE '%' || $1 || '%' ESCAPE '\'
            ORDER BY seq
        "#;

        let rows = sqlx::query(query)
            .bind(escape_like(keyword))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BulkbuyError::database(format!("Failed to search products: {}", e)))?;

        debug!(keyword, matches = rows.len(), "Product name search");
        Self::products_from_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("shirt"), "shirt");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\path"), "c:\\\\path");
    }

    #[tokio::test]
    async fn test_integrate_without_url() {
        let settings = DatabaseSettings::default();
        let pool = integrate(&settings).await.unwrap();
        assert!(pool.is_none());
    }

    #[tokio::test]
    async fn test_integrate_tolerates_bad_url() {
        let settings = DatabaseSettings {
            url: Some("not-a-database-url".to_string()),
            fail_fast: false,
            max_connections: 1,
        };
        assert!(integrate(&settings).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_integrate_fail_fast() {
        let settings = DatabaseSettings {
            url: Some("not-a-database-url".to_string()),
            fail_fast: true,
            max_connections: 1,
        };
        let result = integrate(&settings).await;
        assert!(matches!(result, Err(BulkbuyError::Database { .. })));
    }
}
