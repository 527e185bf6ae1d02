//! # App Context
//!
//! Builds every collaborator once at startup and hands out `Arc` handles.
//!
//! ```text
//! SyncConfig ──► Database ───────────┐
//!            ──► HttpGateway ────────┤
//!            ──► ConnectivityOracle ─┼──► SyncEngine ◄── TriggerHandle
//!            ──► NotificationSink ───┤         ▲
//!            ──► ImageStore ─────────┘         │ DrainJob
//!                                      BackgroundTrigger (started later)
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use stockline_db::{Database, DbConfig};

use crate::config::{SinkKind, SyncConfig};
use crate::connectivity::{self, ConnectivityOracle};
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{HttpGateway, RemoteGateway};
use crate::images::ImageStore;
use crate::notifier::{GatedSink, NoOpSink, NotificationSink, RecordingSink, TracingSink};
use crate::trigger::{BackgroundTrigger, TriggerHandle};

/// Process-wide wiring of the synchronizer.
pub struct AppContext {
    config: Arc<SyncConfig>,
    db: Database,
    engine: SyncEngine,
    trigger: Option<BackgroundTrigger>,
    trigger_handle: TriggerHandle,
    recording: Option<RecordingSink>,
    notification_permission: Option<Arc<AtomicBool>>,
}

impl AppContext {
    /// Opens the database and builds the HTTP gateway and connectivity
    /// oracle described by `config`.
    pub async fn build(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        let db_config = DbConfig::new(config.database_path()?)
            .recreate_on_incompatible(config.storage.recreate_on_incompatible);
        let db = Database::new(db_config).await?;

        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::from_config(&config)?);
        let connectivity = connectivity::from_config(&config)?;

        Self::assemble(config, db, gateway, connectivity)
    }

    /// Wires the context around an already-open database and
    /// caller-supplied gateway and oracle.
    pub fn assemble(
        config: SyncConfig,
        db: Database,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> SyncResult<Self> {
        let enabled = config.notifications.enabled;
        let mut recording = None;
        let mut notification_permission = None;

        let sink: Arc<dyn NotificationSink> = match config.notifications.sink {
            SinkKind::Tracing => {
                let gated = GatedSink::new(TracingSink, enabled);
                notification_permission = Some(gated.permission());
                Arc::new(gated)
            }
            SinkKind::Recording => {
                let sink = RecordingSink::new();
                recording = Some(sink.clone());
                let gated = GatedSink::new(sink, enabled);
                notification_permission = Some(gated.permission());
                Arc::new(gated)
            }
            SinkKind::None => Arc::new(NoOpSink),
        };

        let images = ImageStore::new(config.image_dir()?, config.cache_dir()?);

        let (trigger, trigger_handle) =
            BackgroundTrigger::new(config.trigger.name.clone(), config.trigger.clone(), connectivity.clone());

        let engine = SyncEngine::new(db.clone(), gateway, connectivity, images)
            .with_sink(sink)
            .with_scheduler(Arc::new(trigger_handle.clone()))
            .with_refresh_delay(config.refresh_delay());

        info!(
            database = %db.path().display(),
            trigger = %trigger_handle.name(),
            "Sync context ready"
        );

        Ok(AppContext {
            config: Arc::new(config),
            db,
            engine,
            trigger: Some(trigger),
            trigger_handle,
            recording,
            notification_permission,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn trigger_handle(&self) -> &TriggerHandle {
        &self.trigger_handle
    }

    /// Event log when `[notifications] sink = "recording"`.
    pub fn recording(&self) -> Option<&RecordingSink> {
        self.recording.as_ref()
    }

    /// Permission flag of the gated sink, for the host to flip when the
    /// platform grants or revokes notification permission.
    pub fn notification_permission(&self) -> Option<Arc<AtomicBool>> {
        self.notification_permission.clone()
    }

    /// Starts the background trigger. Drains scheduled before this call
    /// run as soon as it starts.
    pub fn start_trigger(&mut self) -> SyncResult<JoinHandle<()>> {
        let trigger = self
            .trigger
            .take()
            .ok_or_else(|| SyncError::UnexpectedFailure("background trigger already started".into()))?;

        Ok(trigger.spawn(Arc::new(self.engine.clone())))
    }

    /// Stops the trigger and closes the database.
    pub async fn shutdown(&self) {
        if self.trigger.is_none() {
            let _ = self.trigger_handle.shutdown().await;
        }
        self.db.close().await;
        info!("Sync context shut down");
    }
}
