//! # stockline-sync: Sync Engine for Stockline
//!
//! Accepts "add product" requests, sends them straight to the product API
//! when online, queues them durably when not, and drains the queue from a
//! background trigger once the network is back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Architecture                              │
//! │                                                                         │
//! │  UI / agent CLI                                                        │
//! │     │ add_product, list_products, notifications, mark_all_viewed       │
//! │     ▼                                                                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       SyncEngine                                 │  │
//! │  │  online  ─► RemoteGateway.create_product ─► status + sink        │  │
//! │  │  offline ─► PendingUploads.enqueue ─► DrainScheduler             │  │
//! │  └───────┬───────────────────────┬──────────────────────────┬───────┘  │
//! │          ▼                       ▼                          ▼          │
//! │  ┌────────────────┐  ┌─────────────────────┐  ┌──────────────────────┐ │
//! │  │ stockline-db   │  │ ConnectivityOracle  │  │ NotificationSink     │ │
//! │  │ live queries   │  │ HTTP probe / static │  │ tracing / recording  │ │
//! │  └────────────────┘  └─────────────────────┘  └──────────────────────┘ │
//! │          ▲                                                              │
//! │  ┌───────┴──────────────────────────────────────────────────────────┐  │
//! │  │  BackgroundTrigger: single permit, network gate, backoff retry  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML + environment configuration
//! - [`connectivity`] - Online/offline oracle
//! - [`context`] - Startup wiring (`AppContext`)
//! - [`engine`] - `SyncEngine`, the orchestrator
//! - [`error`] - Sync error types
//! - [`gateway`] - Product API client
//! - [`images`] - Image persistence and attachment loading
//! - [`notifier`] - Notification sinks
//! - [`trigger`] - Background drain trigger

pub mod config;
pub mod connectivity;
pub mod context;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod images;
pub mod notifier;
pub mod trigger;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConnectivityMode, SinkKind, SyncConfig};
pub use connectivity::{ConnectivityOracle, HttpProbe, StaticConnectivity};
pub use context::AppContext;
pub use engine::{AddOutcome, DrainFailure, DrainReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use gateway::{HttpGateway, ImageAttachment, ProductFields, RemoteGateway};
pub use images::ImageStore;
pub use notifier::{GatedSink, NoOpSink, NotificationSink, RecordingSink, SinkEvent, TracingSink};
pub use trigger::{
    BackgroundTrigger, DrainJob, DrainScheduler, NoOpScheduler, TriggerHandle, TriggerState, WorkOutcome,
};
