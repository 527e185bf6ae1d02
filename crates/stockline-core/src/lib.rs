//! # stockline-core: Pure Domain Types for Stockline
//!
//! This crate holds the records that flow between the UI, the local store
//! and the remote product API. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI (external collaborator)                   │   │
//! │  │   add product ──► product list ──► notification badge/list      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               stockline-sync (engine + trigger)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockline-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌───────────────┐  ┌──────────────┐          │   │
//! │  │   │   types    │  │  validation   │  │    error     │          │   │
//! │  │   │  Product   │  │  name, type   │  │  Validation  │          │   │
//! │  │   │  Pending   │  │  price, tax   │  │  CoreError   │          │   │
//! │  │   │  Notif.    │  │               │  │              │          │   │
//! │  │   └────────────┘  └───────────────┘  └──────────────┘          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               stockline-db (SQLite local store)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, PendingUpload, Notification, UploadStatus
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation for new products
//!
//! ## Example Usage
//!
//! ```rust
//! use stockline_core::NewProduct;
//!
//! let request = NewProduct::new("Pen", "Stationery", 10.0, 5.0);
//! assert!(request.validate().is_ok());
//!
//! let bad = NewProduct::new("Pen", "Stationery", 10.0, 120.0);
//! assert!(bad.validate().is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a product name or product type.
pub const MAX_NAME_LENGTH: usize = 200;

/// Upper bound for the tax percentage (inclusive).
pub const MAX_TAX_PERCENT: f64 = 100.0;
