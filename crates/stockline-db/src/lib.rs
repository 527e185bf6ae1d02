//! # stockline-db: Local Store for Stockline
//!
//! Durable storage for the product cache, the offline write queue and the
//! notification log, on SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Data Flow                              │
//! │                                                                         │
//! │  SyncEngine (add_product / drain_pending / list_products)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ ProductRepo    │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │ PendingRepo    │    └──────────────┘  │   │
//! │  │   │ ChangeFeed    │    │ NotificationRe │                      │   │
//! │  │   └───────────────┘    └────────────────┘                      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite file: <data dir>/stockline.db                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`live`] - Change feed and live queries
//! - [`error`] - Database error types
//! - [`repository`] - Product, pending upload and notification tables
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockline.db")).await?;
//! let queued = db.pending_uploads().list_oldest_first().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod live;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use live::{ChangeFeed, Table};
pub use pool::{Database, DbConfig};
pub use repository::{NotificationRepository, PendingUploadRepository, ProductRepository};
