//! # Sync Engine
//!
//! Orchestrates every "add product" request from acceptance to a terminal
//! notification, and keeps the product cache in step with the server.
//!
//! ## Add Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_product(request, caller)                                          │
//! │     │                                                                   │
//! │     ├── invalid? ──────────────────────────────► Err(Validation)       │
//! │     │                                                                   │
//! │     ├── OFFLINE                                                         │
//! │     │    1. copy image → <images>/image_<uuid>.jpg                      │
//! │     │    2. BEGIN; INSERT pending_uploads; UPSERT notification; COMMIT │
//! │     │    3. sink.show_progress                                          │
//! │     │    4. trigger.schedule_drain ─────────────► Ok(Queued)           │
//! │     │                                                                   │
//! │     └── ONLINE                                                          │
//! │          1. sink.show_progress                                          │
//! │          2. notification Pending (if absent)                            │
//! │          3. gateway.create_product(fields, image?)                      │
//! │          4. ok  → status Uploaded → sink.show_success ► Ok(Delivered)  │
//! │             err → status Failed   → sink.show_failure ► Err(e)         │
//! │                                                                         │
//! │  Status is written to the store BEFORE the sink renders it.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drain
//! Pending rows are replayed oldest first through the same online path. A
//! delivered row is deleted, a failed one stays queued. Per-item failures
//! never abort the batch; only a failure to read the queue asks the
//! trigger for a retry.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{self, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use stockline_core::{Caller, LoadState, NewProduct, Notification, PendingUpload, Product, UploadStatus};
use stockline_db::Database;

use crate::connectivity::ConnectivityOracle;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{ProductFields, RemoteGateway};
use crate::images::ImageStore;
use crate::notifier::{NotificationSink, TracingSink};
use crate::trigger::{DrainJob, DrainScheduler, NoOpScheduler, WorkOutcome};

/// Default pause after a manual refresh.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(1_000);

// =============================================================================
// Outcomes
// =============================================================================

/// Successful result of [`SyncEngine::add_product`].
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// The server confirmed the product.
    Delivered(Product),

    /// Accepted while offline. Delivery happens on a later drain.
    Queued { pending_id: i64 },
}

impl AddOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, AddOutcome::Queued { .. })
    }
}

/// One queued item that failed during a drain.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainFailure {
    pub pending_id: i64,
    pub product_name: String,
    pub message: String,
}

/// Summary of one [`SyncEngine::drain_pending`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DrainFailure>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// The write-queue synchronizer.
///
/// Cheap to clone; clones share every collaborator.
#[derive(Clone)]
pub struct SyncEngine {
    db: Database,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: Arc<dyn ConnectivityOracle>,
    sink: Arc<dyn NotificationSink>,
    scheduler: Arc<dyn DrainScheduler>,
    images: ImageStore,
    refresh_delay: Duration,
}

impl SyncEngine {
    /// Creates an engine that logs notifications and never schedules a
    /// background drain. Use the `with_*` builders to replace either.
    pub fn new(
        db: Database,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: Arc<dyn ConnectivityOracle>,
        images: ImageStore,
    ) -> Self {
        SyncEngine {
            db,
            gateway,
            connectivity,
            sink: Arc::new(TracingSink),
            scheduler: Arc::new(NoOpScheduler),
            images,
            refresh_delay: DEFAULT_REFRESH_DELAY,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn DrainScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Add Product
    // =========================================================================

    /// Accepts an "add product" request.
    ///
    /// ## Arguments
    /// * `request` - Product fields and an optional image content reference
    /// * `caller` - Where the image reference came from
    ///
    /// ## Returns
    /// * `Ok(Delivered)` - The server created the product
    /// * `Ok(Queued)` - Offline; stored for a later drain
    /// * `Err(SyncError)` - Validation, remote or local failure. The
    ///   notification for the product is `Failed` unless validation failed.
    pub async fn add_product(&self, request: NewProduct, caller: Caller) -> SyncResult<AddOutcome> {
        request.validate()?;

        if !self.connectivity.is_online().await {
            return self.enqueue_offline(&request).await;
        }

        let product = self.upload(&request, caller).await?;
        Ok(AddOutcome::Delivered(product))
    }

    async fn enqueue_offline(&self, request: &NewProduct) -> SyncResult<AddOutcome> {
        let image_path = match &request.image {
            Some(reference) => match self.images.persist(reference).await {
                Ok(path) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!(product_name = %request.name, error = %e, "Could not keep image, queueing without it");
                    None
                }
            },
            None => None,
        };

        let pending = self
            .db
            .pending_uploads()
            .enqueue(request, image_path.as_deref())
            .await?;

        info!(
            pending_id = pending.id,
            product_name = %request.name,
            "Offline, product queued for upload"
        );

        self.sink.show_progress(&request.name);
        self.scheduler.schedule_drain();

        Ok(AddOutcome::Queued { pending_id: pending.id })
    }

    /// The online path, shared by foreground adds and the drain.
    async fn upload(&self, request: &NewProduct, caller: Caller) -> SyncResult<Product> {
        self.sink.show_progress(&request.name);

        let result = AssertUnwindSafe(self.send(request, caller))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(SyncError::UnexpectedFailure("upload task panicked".to_string())));

        match result {
            Ok(product) => {
                self.record_status(&request.name, UploadStatus::Uploaded).await;
                self.sink.hide_progress();
                self.sink.show_success(&request.name);
                info!(product_name = %request.name, product_id = ?product.id, "Product uploaded");
                Ok(product)
            }
            Err(e) => {
                error!(product_name = %request.name, error = %e, "Product upload failed");
                self.record_status(&request.name, UploadStatus::Failed).await;
                self.sink.hide_progress();
                self.sink.show_failure(&request.name, &e.to_string());
                Err(e)
            }
        }
    }

    async fn send(&self, request: &NewProduct, caller: Caller) -> SyncResult<Product> {
        self.db
            .notifications()
            .insert_pending_if_absent(&request.name, &request.product_type)
            .await?;

        let attachment = match &request.image {
            Some(reference) => self.images.load_attachment(reference, caller).await,
            None => None,
        };

        self.gateway
            .create_product(&ProductFields::from(request), attachment)
            .await
    }

    async fn record_status(&self, product_name: &str, status: UploadStatus) {
        if let Err(e) = self.db.notifications().update_status(product_name, status).await {
            error!(product_name = %product_name, status = %status, error = %e, "Could not record upload status");
        }
    }

    // =========================================================================
    // Drain
    // =========================================================================

    /// Replays every queued upload, oldest first.
    ///
    /// ## Returns
    /// * `Ok(DrainReport)` - The batch ran; individual items may have failed
    /// * `Err(SyncError)` - The queue could not be read
    pub async fn drain_pending(&self) -> SyncResult<DrainReport> {
        let queued = self.db.pending_uploads().list_oldest_first().await?;
        let mut report = DrainReport::default();

        if queued.is_empty() {
            debug!("Nothing queued");
            return Ok(report);
        }

        info!(count = queued.len(), "Draining queued uploads");

        for pending in queued {
            report.attempted += 1;
            match self.upload(&pending.to_request(), Caller::Background).await {
                Ok(_) => {
                    report.delivered += 1;
                    self.forget(&pending).await;
                }
                Err(e) => report.failures.push(DrainFailure {
                    pending_id: pending.id,
                    product_name: pending.name.clone(),
                    message: e.to_string(),
                }),
            }
        }

        self.sink.hide_progress();

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failures.len(),
            "Drain finished"
        );
        Ok(report)
    }

    async fn forget(&self, pending: &PendingUpload) {
        if let Err(e) = self.db.pending_uploads().delete(pending.id).await {
            error!(pending_id = pending.id, error = %e, "Delivered upload could not be removed from the queue");
            return;
        }
        if let Some(path) = &pending.image_path {
            self.images.discard(path).await;
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Live product list.
    ///
    /// Emits `Loading`, refreshes from the server when online (a failed
    /// refresh keeps the cache), then emits `Ready` for the cache and again
    /// after every change to it.
    pub fn list_products(&self) -> BoxStream<'static, LoadState<Vec<Product>>> {
        let engine = self.clone();

        let cache = stream::once(async move {
            if engine.connectivity.is_online().await {
                if let Err(e) = engine.refresh_cache().await {
                    warn!(error = %e, "Refresh failed, showing cached products");
                }
            }

            engine.db.products().watch_all().map(|result| match result {
                Ok(products) => LoadState::Ready(products),
                Err(e) => LoadState::Failed(e.to_string()),
            })
        })
        .flatten();

        stream::once(future::ready(LoadState::Loading))
            .chain(cache)
            .boxed()
    }

    /// Manual "pull to refresh".
    ///
    /// ## Returns
    /// `true` when the cache was replaced from the server.
    pub async fn refresh_products(&self) -> bool {
        if !self.connectivity.is_online().await {
            debug!("Offline, refresh skipped");
            return false;
        }

        let refreshed = match self.refresh_cache().await {
            Ok(count) => {
                info!(count, "Product cache refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed");
                false
            }
        };

        tokio::time::sleep(self.refresh_delay).await;
        refreshed
    }

    /// Replaces the cache with the server list. A failed fetch leaves the
    /// cache untouched.
    async fn refresh_cache(&self) -> SyncResult<usize> {
        let products = self.gateway.fetch_all().await?;
        self.db.products().replace_all(&products).await?;
        Ok(products.len())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Live count of unviewed notifications.
    pub fn unviewed_notification_count(&self) -> BoxStream<'static, u64> {
        self.db
            .notifications()
            .watch_unviewed_count()
            .filter_map(|result| {
                future::ready(match result {
                    Ok(count) => Some(count),
                    Err(e) => {
                        warn!(error = %e, "Unviewed count query failed");
                        None
                    }
                })
            })
            .boxed()
    }

    /// Marks every notification viewed.
    pub async fn mark_all_viewed(&self) -> SyncResult<u64> {
        Ok(self.db.notifications().mark_all_viewed().await?)
    }

    /// Live notification list, newest first.
    pub fn notifications(&self) -> BoxStream<'static, LoadState<Vec<Notification>>> {
        let rows = self.db.notifications().watch_all().map(|result| match result {
            Ok(list) => LoadState::Ready(list),
            Err(e) => LoadState::Failed(e.to_string()),
        });

        stream::once(future::ready(LoadState::Loading))
            .chain(rows)
            .boxed()
    }

    /// Number of uploads still queued.
    pub async fn pending_count(&self) -> SyncResult<u64> {
        Ok(self.db.pending_uploads().count().await?)
    }
}

#[async_trait]
impl DrainJob for SyncEngine {
    async fn run(&self) -> WorkOutcome {
        match self.drain_pending().await {
            Ok(report) => {
                if !report.is_clean() {
                    warn!(failed = report.failures.len(), "Some uploads stay queued for the next drain");
                }
                WorkOutcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Drain could not run");
                WorkOutcome::Retry
            }
        }
    }
}
