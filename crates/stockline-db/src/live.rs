//! # Live Queries
//!
//! Change notification for the local store.
//!
//! ## How It Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Change Feed                                     │
//! │                                                                         │
//! │  writer                                                                 │
//! │    │ lock_writes() ──► BEGIN ... COMMIT ──► publish(table)             │
//! │    │                                            │                       │
//! │    │                                 watch<u64> version += 1            │
//! │    │                                            │                       │
//! │    ▼                                            ▼                       │
//! │  guard dropped              ┌─────────────────────────────────┐        │
//! │                             │ live(table, query)              │        │
//! │                             │   WatchStream ──then──► query() │        │
//! │                             │   emits once on subscribe, then │        │
//! │                             │   once per observed version     │        │
//! │                             └─────────────────────────────────┘        │
//! │                                                                         │
//! │  Versions published while a query is running collapse into one re-run. │
//! │  Dropping the stream drops the receiver, which is the unsubscribe.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::error::DbResult;

// =============================================================================
// Tables
// =============================================================================

/// Tables that live queries can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Products,
    PendingUploads,
    Notifications,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::PendingUploads => "pending_uploads",
            Table::Notifications => "notifications",
        }
    }
}

// =============================================================================
// Change Feed
// =============================================================================

/// Per-table version counters plus the store-wide write lock.
///
/// Cloning is cheap; all clones share the same counters and lock.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

#[derive(Debug)]
struct FeedInner {
    products: watch::Sender<u64>,
    pending_uploads: watch::Sender<u64>,
    notifications: watch::Sender<u64>,
    write_lock: Mutex<()>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        ChangeFeed {
            inner: Arc::new(FeedInner {
                products: watch::Sender::new(0),
                pending_uploads: watch::Sender::new(0),
                notifications: watch::Sender::new(0),
                write_lock: Mutex::new(()),
            }),
        }
    }

    fn sender(&self, table: Table) -> &watch::Sender<u64> {
        match table {
            Table::Products => &self.inner.products,
            Table::PendingUploads => &self.inner.pending_uploads,
            Table::Notifications => &self.inner.notifications,
        }
    }

    /// Serializes writers.
    ///
    /// Every repository write holds this guard from `BEGIN` until the
    /// change has been published.
    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.inner.write_lock.lock().await
    }

    /// Bumps the version of `table`, waking every live query on it.
    pub fn publish(&self, table: Table) {
        self.sender(table).send_modify(|version| *version += 1);
        trace!(table = table.as_str(), version = self.version(table), "Published change");
    }

    /// Current version of `table`. Starts at 0.
    pub fn version(&self, table: Table) -> u64 {
        *self.sender(table).borrow()
    }

    /// Raw subscription to a table's version counter.
    pub fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        self.sender(table).subscribe()
    }

    /// Builds a live query.
    ///
    /// ## Arguments
    /// * `table` - Table whose writes trigger a re-run
    /// * `query` - Produces a fresh query future for each run
    ///
    /// ## Example
    /// ```rust,ignore
    /// let repo = self.clone();
    /// feed.live(Table::Products, move || {
    ///     let repo = repo.clone();
    ///     async move { repo.list_all().await }
    /// })
    /// ```
    pub fn live<T, F, Fut>(&self, table: Table, query: F) -> BoxStream<'static, DbResult<T>>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        WatchStream::new(self.subscribe(table))
            .then(move |_version| query())
            .boxed()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_publish_bumps_only_that_table() {
        let feed = ChangeFeed::new();
        feed.publish(Table::Notifications);
        feed.publish(Table::Notifications);

        assert_eq!(feed.version(Table::Notifications), 2);
        assert_eq!(feed.version(Table::Products), 0);
        assert_eq!(feed.version(Table::PendingUploads), 0);
    }

    #[tokio::test]
    async fn test_live_emits_initial_then_on_change() {
        let feed = ChangeFeed::new();
        let runs = Arc::new(AtomicU64::new(0));

        let counter = runs.clone();
        let mut stream = feed.live(Table::Products, move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), 0);

        feed.publish(Table::Products);
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);

        // Writes to other tables don't wake this query.
        feed.publish(Table::Notifications);
        feed.publish(Table::Products);
        assert_eq!(stream.next().await.unwrap().unwrap(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_write_lock_is_exclusive() {
        let feed = ChangeFeed::new();
        let guard = feed.lock_writes().await;
        assert!(feed.inner.write_lock.try_lock().is_err());
        drop(guard);
        assert!(feed.inner.write_lock.try_lock().is_ok());
    }
}
