//! # Pending Upload Repository
//!
//! The write queue: "add product" mutations accepted while offline.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_product (offline)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue ── one transaction ──┬── INSERT pending_uploads               │
//! │                               └── UPSERT notifications (pending)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  drain_pending                                                         │
//! │  ├── list_oldest_first  (created_at, id)                               │
//! │  ├── remote write per row                                              │
//! │  └── delete(id) on success, row stays on failure                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use futures_util::stream::BoxStream;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::live::{ChangeFeed, Table};
use crate::repository::notification::upsert_pending_on;
use stockline_core::{NewProduct, PendingUpload};

/// Repository for the pending upload queue.
#[derive(Debug, Clone)]
pub struct PendingUploadRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl PendingUploadRepository {
    /// Creates a new PendingUploadRepository.
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        PendingUploadRepository { pool, feed }
    }

    /// Queues a mutation and marks its notification Pending.
    ///
    /// Both rows commit together or not at all.
    ///
    /// ## Arguments
    /// * `request` - The accepted product fields
    /// * `image_path` - Stable local copy of the image, if any
    ///
    /// ## Returns
    /// The stored row, with its new id.
    pub async fn enqueue(&self, request: &NewProduct, image_path: Option<&str>) -> DbResult<PendingUpload> {
        let _guard = self.feed.lock_writes().await;
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let id = sqlx::query(
            r#"
            INSERT INTO pending_uploads (name, product_type, price, tax, image_path, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&request.name)
        .bind(&request.product_type)
        .bind(request.price)
        .bind(request.tax)
        .bind(image_path)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        upsert_pending_on(&mut tx, &request.name, &request.product_type, now).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        self.feed.publish(Table::PendingUploads);
        self.feed.publish(Table::Notifications);

        info!(pending_id = id, product_name = %request.name, "Upload queued");

        Ok(PendingUpload {
            id,
            name: request.name.clone(),
            product_type: request.product_type.clone(),
            price: request.price,
            tax: request.tax,
            image_path: image_path.map(str::to_string),
            created_at: now,
        })
    }

    /// All queued rows in FIFO order.
    pub async fn list_oldest_first(&self) -> DbResult<Vec<PendingUpload>> {
        let rows = sqlx::query_as::<_, PendingUpload>(
            r#"
            SELECT id, name, product_type, price, tax, image_path, created_at
            FROM pending_uploads
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded pending uploads");
        Ok(rows)
    }

    /// Gets one queued row.
    pub async fn get(&self, id: i64) -> DbResult<Option<PendingUpload>> {
        let row = sqlx::query_as::<_, PendingUpload>(
            r#"
            SELECT id, name, product_type, price, tax, image_path, created_at
            FROM pending_uploads
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Removes a row once its remote write succeeded.
    ///
    /// ## Returns
    /// `false` if the row was already gone.
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let _guard = self.feed.lock_writes().await;

        let result = sqlx::query("DELETE FROM pending_uploads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.feed.publish(Table::PendingUploads);
        }
        Ok(deleted)
    }

    /// Number of queued rows.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_uploads")
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(count).map_err(|e| DbError::Internal(e.to_string()))
    }

    /// Live queue length.
    pub fn watch_count(&self) -> BoxStream<'static, DbResult<u64>> {
        let repo = self.clone();
        self.feed.live(Table::PendingUploads, move || {
            let repo = repo.clone();
            async move { repo.count().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use futures_util::StreamExt;
    use stockline_core::{NewProduct, UploadStatus};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_writes_row_and_pending_notification() {
        let db = db().await;
        let request = NewProduct::new("Pen", "Stationery", 10.0, 5.0);

        let row = db
            .pending_uploads()
            .enqueue(&request, Some("/tmp/image_1.jpg"))
            .await
            .unwrap();

        assert_eq!(row.name, "Pen");
        assert_eq!(db.pending_uploads().count().await.unwrap(), 1);

        let stored = db.pending_uploads().get(row.id).await.unwrap().unwrap();
        assert_eq!(stored.image_path.as_deref(), Some("/tmp/image_1.jpg"));
        assert_eq!(stored.price, 10.0);

        let notification = db.notifications().get_by_name("Pen").await.unwrap().unwrap();
        assert_eq!(notification.status, UploadStatus::Pending);
        assert!(!notification.is_viewed);
    }

    #[tokio::test]
    async fn test_list_oldest_first_and_delete() {
        let db = db().await;
        let repo = db.pending_uploads();

        let first = repo.enqueue(&NewProduct::new("A", "T", 1.0, 0.0), None).await.unwrap();
        let second = repo.enqueue(&NewProduct::new("B", "T", 2.0, 0.0), None).await.unwrap();

        let ids: Vec<i64> = repo.list_oldest_first().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        assert!(repo.delete(first.id).await.unwrap());
        assert!(!repo.delete(first.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_name_twice_keeps_both_rows_one_notification() {
        let db = db().await;
        let repo = db.pending_uploads();

        repo.enqueue(&NewProduct::new("Pen", "T", 1.0, 0.0), None).await.unwrap();
        repo.enqueue(&NewProduct::new("Pen", "T", 2.0, 0.0), None).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(db.notifications().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_count() {
        let db = db().await;
        let repo = db.pending_uploads();
        let mut count = repo.watch_count();

        assert_eq!(count.next().await.unwrap().unwrap(), 0);

        let row = repo.enqueue(&NewProduct::new("Pen", "T", 1.0, 0.0), None).await.unwrap();
        assert_eq!(count.next().await.unwrap().unwrap(), 1);

        repo.delete(row.id).await.unwrap();
        assert_eq!(count.next().await.unwrap().unwrap(), 0);
    }
}
