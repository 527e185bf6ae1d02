//! # Notification Sink
//!
//! Where the engine asks for user-visible progress/success/failure
//! notifications. The durable status lives in the `notifications` table;
//! a sink only renders it.
//!
//! ## Sinks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TracingSink     structured log lines (headless default)               │
//! │  GatedSink<S>    drops every call while permission is revoked          │
//! │  RecordingSink   in-memory event log (hosts that poll, tests)          │
//! │  NoOpSink        nothing                                               │
//! │                                                                         │
//! │  Every call is infallible: a sink must never fail an upload.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stable Ids
//! Repeated calls for the same product replace the same OS notification:
//! ```text
//! progress  20000 + h(name)      success  30000 + h(name)
//! failure   40000 + h(name)      group    10000
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

/// Group summary id shared by all upload notifications.
pub const GROUP_SUMMARY_ID: i64 = 10_000;

const PROGRESS_BASE: i64 = 20_000;
const SUCCESS_BASE: i64 = 30_000;
const FAILURE_BASE: i64 = 40_000;

// =============================================================================
// Sink Trait
// =============================================================================

/// Renders upload notifications.
pub trait NotificationSink: Send + Sync {
    /// "Uploading {name}..."
    fn show_progress(&self, product_name: &str);

    /// Clears the progress notification.
    fn hide_progress(&self);

    /// "{name} uploaded"
    fn show_success(&self, product_name: &str);

    /// "{name} failed: {reason}"
    fn show_failure(&self, product_name: &str, reason: &str);
}

/// Which notification a stable id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Progress,
    Success,
    Failure,
}

/// Stable OS notification id for a product.
pub fn notification_id(kind: NotificationKind, product_name: &str) -> i64 {
    let base = match kind {
        NotificationKind::Progress => PROGRESS_BASE,
        NotificationKind::Success => SUCCESS_BASE,
        NotificationKind::Failure => FAILURE_BASE,
    };
    base + name_hash(product_name)
}

fn name_hash(product_name: &str) -> i64 {
    let mut hasher = DefaultHasher::new();
    product_name.hash(&mut hasher);
    (hasher.finish() & 0x7FFF_FFFF) as i64
}

// =============================================================================
// Tracing Sink
// =============================================================================

/// Logs each notification as a structured event.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show_progress(&self, product_name: &str) {
        info!(
            notification_id = notification_id(NotificationKind::Progress, product_name),
            product_name = %product_name,
            "Uploading product"
        );
    }

    fn hide_progress(&self) {
        info!("Upload progress cleared");
    }

    fn show_success(&self, product_name: &str) {
        info!(
            notification_id = notification_id(NotificationKind::Success, product_name),
            product_name = %product_name,
            "Product uploaded"
        );
    }

    fn show_failure(&self, product_name: &str, reason: &str) {
        warn!(
            notification_id = notification_id(NotificationKind::Failure, product_name),
            product_name = %product_name,
            reason = %reason,
            "Product upload failed"
        );
    }
}

// =============================================================================
// Gated Sink
// =============================================================================

/// Forwards to an inner sink only while permission is granted.
///
/// Revoking permission turns every call into a silent no-op.
pub struct GatedSink<S> {
    inner: S,
    permitted: Arc<AtomicBool>,
}

impl<S: NotificationSink> GatedSink<S> {
    pub fn new(inner: S, permitted: bool) -> Self {
        GatedSink {
            inner,
            permitted: Arc::new(AtomicBool::new(permitted)),
        }
    }

    /// Shared permission flag, for the host to flip later.
    pub fn permission(&self) -> Arc<AtomicBool> {
        self.permitted.clone()
    }

    fn allowed(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }
}

impl<S: NotificationSink> NotificationSink for GatedSink<S> {
    fn show_progress(&self, product_name: &str) {
        if self.allowed() {
            self.inner.show_progress(product_name);
        }
    }

    fn hide_progress(&self) {
        if self.allowed() {
            self.inner.hide_progress();
        }
    }

    fn show_success(&self, product_name: &str) {
        if self.allowed() {
            self.inner.show_success(product_name);
        }
    }

    fn show_failure(&self, product_name: &str, reason: &str) {
        if self.allowed() {
            self.inner.show_failure(product_name, reason);
        }
    }
}

// =============================================================================
// Recording Sink
// =============================================================================

/// One rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Progress(String),
    HideProgress,
    Success(String),
    Failure(String, String),
}

/// Keeps every call in memory.
///
/// Clones share the log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<SinkEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn record(&self, event: SinkEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl NotificationSink for RecordingSink {
    fn show_progress(&self, product_name: &str) {
        self.record(SinkEvent::Progress(product_name.to_string()));
    }

    fn hide_progress(&self) {
        self.record(SinkEvent::HideProgress);
    }

    fn show_success(&self, product_name: &str) {
        self.record(SinkEvent::Success(product_name.to_string()));
    }

    fn show_failure(&self, product_name: &str, reason: &str) {
        self.record(SinkEvent::Failure(product_name.to_string(), reason.to_string()));
    }
}

// =============================================================================
// No-Op Sink
// =============================================================================

/// Discards everything.
pub struct NoOpSink;

impl NotificationSink for NoOpSink {
    fn show_progress(&self, _product_name: &str) {}
    fn hide_progress(&self) {}
    fn show_success(&self, _product_name: &str) {}
    fn show_failure(&self, _product_name: &str, _reason: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_and_ranged() {
        let a = notification_id(NotificationKind::Progress, "Pen");
        let b = notification_id(NotificationKind::Progress, "Pen");
        assert_eq!(a, b);
        assert!(a >= PROGRESS_BASE && a <= PROGRESS_BASE + 0x7FFF_FFFF);

        let success = notification_id(NotificationKind::Success, "Pen");
        assert_eq!(success - SUCCESS_BASE, a - PROGRESS_BASE);
        assert_ne!(success, notification_id(NotificationKind::Failure, "Pen"));
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.show_progress("Pen");
        sink.show_failure("Pen", "Server error");
        sink.hide_progress();

        assert_eq!(
            sink.drain(),
            vec![
                SinkEvent::Progress("Pen".into()),
                SinkEvent::Failure("Pen".into(), "Server error".into()),
                SinkEvent::HideProgress,
            ]
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_gated_sink_silently_drops_without_permission() {
        let recording = RecordingSink::new();
        let gated = GatedSink::new(recording.clone(), false);

        gated.show_progress("Pen");
        gated.show_success("Pen");
        assert!(recording.events().is_empty());

        gated.permission().store(true, Ordering::SeqCst);
        gated.show_success("Pen");
        assert_eq!(recording.events(), vec![SinkEvent::Success("Pen".into())]);
    }
}
