//! # Product Repository
//!
//! The local product cache.
//!
//! The cache mirrors the last successful remote list fetch. It is never
//! merged incrementally: `replace_all` swaps the whole table inside one
//! transaction so concurrent readers see either the old list or the new
//! one, never an empty intermediate.

use futures_util::stream::BoxStream;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::live::{ChangeFeed, Table};
use stockline_core::Product;

/// Repository for the product cache.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// repo.replace_all(&fetched).await?;
/// let cached = repo.list_all().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        ProductRepository { pool, feed }
    }

    /// Cached products in server list order.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, product_type, price, tax, image
            FROM products
            ORDER BY local_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Replaces the whole cache with `products`.
    ///
    /// ## Arguments
    /// * `products` - The freshly fetched remote list, in server order
    pub async fn replace_all(&self, products: &[Product]) -> DbResult<()> {
        let _guard = self.feed.lock_writes().await;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, product_type, price, tax, image)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.product_type)
            .bind(product.price)
            .bind(product.tax)
            .bind(&product.image)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        self.feed.publish(Table::Products);

        info!(count = products.len(), "Product cache replaced");
        Ok(())
    }

    /// Number of cached products.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        debug!(count, "Counted cached products");
        u64::try_from(count).map_err(|e| DbError::Internal(e.to_string()))
    }

    /// Live product list.
    pub fn watch_all(&self) -> BoxStream<'static, DbResult<Vec<Product>>> {
        let repo = self.clone();
        self.feed.live(Table::Products, move || {
            let repo = repo.clone();
            async move { repo.list_all().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use futures_util::StreamExt;
    use stockline_core::Product;

    fn product(name: &str, price: f64) -> Product {
        Product {
            id: None,
            name: name.to_string(),
            product_type: "Stationery".to_string(),
            price,
            tax: 5.0,
            image: Some(format!("https://cdn.example.com/{name}.jpg")),
        }
    }

    #[tokio::test]
    async fn test_replace_all_keeps_server_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.replace_all(&[product("Zeta", 1.0), product("Alpha", 2.0)])
            .await
            .unwrap();

        let names: Vec<String> = repo.list_all().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[tokio::test]
    async fn test_replace_all_replaces_not_merges() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.replace_all(&[product("A", 1.0), product("B", 2.0), product("C", 3.0)])
            .await
            .unwrap();
        assert_eq!(repo.count().await.unwrap(), 3);

        let mut with_id = product("D", 4.0);
        with_id.id = Some(42);
        repo.replace_all(&[with_id.clone()]).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap(), vec![with_id]);
    }

    #[tokio::test]
    async fn test_watch_all_emits_after_replace() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let mut live = repo.watch_all();

        assert!(live.next().await.unwrap().unwrap().is_empty());

        repo.replace_all(&[product("Pen", 10.0)]).await.unwrap();
        let emitted = live.next().await.unwrap().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].name, "Pen");
    }
}
