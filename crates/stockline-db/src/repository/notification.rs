//! # Notification Repository
//!
//! The status log behind the notification badge and list.
//!
//! ## One Row Per Product Name
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add "Pen" offline   ──► upsert_pending            Pen  pending  unread │
//! │  drain succeeds      ──► update_status(Uploaded)   Pen  uploaded unread │
//! │  user opens list     ──► mark_all_viewed           Pen  uploaded read   │
//! │  add "Pen" again     ──► upsert_pending            Pen  pending  unread │
//! │                                                                         │
//! │  product_name is UNIQUE: a second add replaces, never appends.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::live::{ChangeFeed, Table};
use stockline_core::{Notification, UploadStatus};

const SELECT_NOTIFICATION: &str = r#"
    SELECT id, product_name, product_type, created_at, is_viewed, status
    FROM notifications
"#;

/// Repository for notification records.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        NotificationRepository { pool, feed }
    }

    /// Creates or resets the notification for `product_name` to Pending.
    ///
    /// An existing row for the same name is replaced: new type, new
    /// timestamp, unread, Pending.
    pub async fn upsert_pending(&self, product_name: &str, product_type: &str) -> DbResult<()> {
        let _guard = self.feed.lock_writes().await;

        let mut conn = self.pool.acquire().await?;
        upsert_pending_on(&mut conn, product_name, product_type, Utc::now()).await?;

        self.feed.publish(Table::Notifications);
        Ok(())
    }

    /// Inserts a Pending notification only when none exists for the name.
    ///
    /// ## Returns
    /// `true` if a row was inserted.
    pub async fn insert_pending_if_absent(&self, product_name: &str, product_type: &str) -> DbResult<bool> {
        let _guard = self.feed.lock_writes().await;

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (product_name, product_type, created_at, is_viewed, status)
            VALUES (?1, ?2, ?3, 0, ?4)
            ON CONFLICT (product_name) DO NOTHING
            "#,
        )
        .bind(product_name)
        .bind(product_type)
        .bind(Utc::now())
        .bind(UploadStatus::Pending)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            self.feed.publish(Table::Notifications);
        }
        Ok(inserted)
    }

    /// Sets the status for `product_name` and marks it unread.
    ///
    /// ## Returns
    /// `false` if no notification exists for the name.
    pub async fn update_status(&self, product_name: &str, status: UploadStatus) -> DbResult<bool> {
        let _guard = self.feed.lock_writes().await;

        let result = sqlx::query(
            "UPDATE notifications SET status = ?1, is_viewed = 0 WHERE product_name = ?2",
        )
        .bind(status)
        .bind(product_name)
        .execute(&self.pool)
        .await?;

        debug!(product_name = %product_name, status = %status, "Notification status updated");

        let updated = result.rows_affected() > 0;
        if updated {
            self.feed.publish(Table::Notifications);
        }
        Ok(updated)
    }

    /// Marks every notification as viewed.
    ///
    /// ## Returns
    /// Number of rows that were unread before the call.
    pub async fn mark_all_viewed(&self) -> DbResult<u64> {
        let _guard = self.feed.lock_writes().await;

        let result = sqlx::query("UPDATE notifications SET is_viewed = 1 WHERE is_viewed = 0")
            .execute(&self.pool)
            .await?;

        let changed = result.rows_affected();
        if changed > 0 {
            self.feed.publish(Table::Notifications);
        }
        Ok(changed)
    }

    /// Number of unread notifications, any status.
    pub async fn count_unviewed(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_viewed = 0")
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(count).map_err(|e| DbError::Internal(e.to_string()))
    }

    /// Live unread count.
    pub fn watch_unviewed_count(&self) -> BoxStream<'static, DbResult<u64>> {
        let repo = self.clone();
        self.feed.live(Table::Notifications, move || {
            let repo = repo.clone();
            async move { repo.count_unviewed().await }
        })
    }

    /// Notification for a product name, if any.
    pub async fn get_by_name(&self, product_name: &str) -> DbResult<Option<Notification>> {
        let sql = format!("{SELECT_NOTIFICATION} WHERE product_name = ?1");
        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(product_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }

    /// All notifications, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Notification>> {
        let sql = format!("{SELECT_NOTIFICATION} ORDER BY created_at DESC, id DESC");
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    /// Live notification list, newest first.
    pub fn watch_all(&self) -> BoxStream<'static, DbResult<Vec<Notification>>> {
        let repo = self.clone();
        self.feed.live(Table::Notifications, move || {
            let repo = repo.clone();
            async move { repo.list_all().await }
        })
    }
}

/// Shared by `upsert_pending` and the pending-upload enqueue transaction.
pub(crate) async fn upsert_pending_on(
    conn: &mut SqliteConnection,
    product_name: &str,
    product_type: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (product_name, product_type, created_at, is_viewed, status)
        VALUES (?1, ?2, ?3, 0, ?4)
        ON CONFLICT (product_name) DO UPDATE SET
            product_type = excluded.product_type,
            created_at = excluded.created_at,
            is_viewed = 0,
            status = excluded.status
        "#,
    )
    .bind(product_name)
    .bind(product_type)
    .bind(now)
    .bind(UploadStatus::Pending)
    .execute(&mut *conn)
    .await?;

    debug!(product_name = %product_name, "Pending notification upserted");
    Ok(())
}
