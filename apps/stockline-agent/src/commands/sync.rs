//! # Sync Commands
//!
//! ```text
//! drain    replay the queue once, in this process
//! pending  show what is still queued
//! run      keep the background trigger alive until Ctrl-C
//! ```

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use stockline_core::PendingUpload;
use stockline_sync::{AppContext, DrainReport, DrainScheduler, SyncEngine};

use crate::error::{ApiError, ApiResult};

/// Result of `drain`.
#[derive(Debug, Clone, Serialize)]
pub struct DrainSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub pending_id: i64,
    pub product_name: String,
    pub message: String,
}

impl From<DrainReport> for DrainSummary {
    fn from(report: DrainReport) -> Self {
        DrainSummary {
            attempted: report.attempted,
            delivered: report.delivered,
            failed: report
                .failures
                .into_iter()
                .map(|f| FailedItem {
                    pending_id: f.pending_id,
                    product_name: f.product_name,
                    message: f.message,
                })
                .collect(),
        }
    }
}

impl fmt::Display for DrainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} queued uploads delivered", self.delivered, self.attempted)?;
        for item in &self.failed {
            write!(f, "\n  #{} {}: {}", item.pending_id, item.product_name, item.message)?;
        }
        Ok(())
    }
}

/// Drains the queue once.
pub async fn drain(engine: &SyncEngine) -> ApiResult<DrainSummary> {
    Ok(engine.drain_pending().await?.into())
}

/// Result of `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct PendingList {
    pub pending: Vec<PendingUpload>,
}

impl fmt::Display for PendingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} queued", self.pending.len())?;
        for p in &self.pending {
            let image = if p.image_path.is_some() { " +image" } else { "" };
            write!(f, "\n  #{} {} ({}){image}", p.id, p.name, p.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Lists queued uploads, oldest first.
pub async fn pending(engine: &SyncEngine) -> ApiResult<PendingList> {
    let pending = engine.db().pending_uploads().list_oldest_first().await?;
    Ok(PendingList { pending })
}

/// Runs the background trigger until Ctrl-C.
///
/// A drain is scheduled at start when anything is already queued.
pub async fn run(ctx: &mut AppContext) -> ApiResult<()> {
    let task = ctx.start_trigger()?;

    let queued = ctx.engine().pending_count().await?;
    if queued > 0 {
        info!(count = queued, "Uploads queued from an earlier session");
        ctx.trigger_handle().schedule_drain();
    }

    info!(trigger = %ctx.trigger_handle().name(), "Agent running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ApiError::internal(format!("Could not listen for Ctrl-C: {e}")))?;

    info!("Shutdown signal received");
    ctx.shutdown().await;

    if let Err(e) = task.await {
        warn!(error = %e, "Trigger task ended abnormally");
    }
    Ok(())
}
