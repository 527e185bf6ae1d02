//! # Domain Types
//!
//! Records shared by the local store, the sync engine and the UI.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  PendingUpload  │   │  Notification   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (remote)    │   │  id (local)     │   │  product_name ◄─┼── key │
//! │  │  name           │   │  name           │   │  status         │       │
//! │  │  product_type   │   │  image_path     │   │  is_viewed      │       │
//! │  │  price, tax     │   │  created_at     │   │  created_at     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │   cache of server       queued mutation       status log, one row      │
//! │   truth                 (FIFO drain)          per product name         │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   NewProduct    │   │  UploadStatus   │   │     Caller      │       │
//! │  │  (UI request)   │   │  Pending        │   │  Foreground     │       │
//! │  │                 │   │  Uploaded       │   │  Background     │       │
//! │  │                 │   │  Failed         │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::validation;

// =============================================================================
// Product
// =============================================================================

/// A product as known to the remote catalog.
///
/// The local copy is a cache of server truth: it is replaced wholesale
/// after every successful list fetch and never merged incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Remote-assigned identifier. `None` until the server confirms it.
    pub id: Option<i64>,

    /// Display name.
    pub name: String,

    /// Free-form category ("Stationery", "Grocery", ...).
    pub product_type: String,

    /// Unit price, non-negative.
    pub price: f64,

    /// Tax percentage, 0..=100.
    pub tax: f64,

    /// Remote URL or local path of the product image.
    pub image: Option<String>,
}

impl Product {
    /// Case-insensitive match against name, type or price.
    ///
    /// Used by hosts that filter the live product list as the user types.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self.product_type.to_lowercase().contains(&query)
            || self.price.to_string().contains(&query)
    }
}

// =============================================================================
// New Product (mutation request)
// =============================================================================

/// An "add product" request coming from the UI or the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub product_type: String,
    pub price: f64,
    pub tax: f64,

    /// Content reference of the picked image: a plain path or a `file://` URI.
    pub image: Option<String>,
}

impl NewProduct {
    /// Creates a request without an image.
    pub fn new(name: impl Into<String>, product_type: impl Into<String>, price: f64, tax: f64) -> Self {
        NewProduct {
            name: name.into(),
            product_type: product_type.into(),
            price,
            tax,
            image: None,
        }
    }

    /// Attaches an image content reference.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Validates every field.
    ///
    /// ## Returns
    /// The first failing rule, checked in field order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_product_name(&self.name)?;
        validation::validate_product_type(&self.product_type)?;
        validation::validate_price(self.price)?;
        validation::validate_tax(self.tax)?;
        Ok(())
    }
}

// =============================================================================
// Pending Upload
// =============================================================================

/// A mutation accepted while offline and not yet confirmed by the remote.
///
/// Destroyed the instant the corresponding remote write succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PendingUpload {
    /// Local auto-increment id.
    pub id: i64,
    pub name: String,
    pub product_type: String,
    pub price: f64,
    pub tax: f64,

    /// Stable local copy of the image, made when the upload was queued.
    pub image_path: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PendingUpload {
    /// Rebuilds the request this row was queued from.
    ///
    /// The image reference is the persisted local path, not the original
    /// content reference.
    pub fn to_request(&self) -> NewProduct {
        NewProduct {
            name: self.name.clone(),
            product_type: self.product_type.clone(),
            price: self.price,
            tax: self.tax,
            image: self.image_path.clone(),
        }
    }
}

// =============================================================================
// Upload Status
// =============================================================================

/// Lifecycle of a notification.
///
/// ```text
///   Pending ──► Uploaded
///      │
///      └──────► Failed ──► (re-queued by a later add) Pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UploadStatus {
    Pending,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Failed => "failed",
        }
    }

    /// True once the remote call has resolved either way.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(UploadStatus::Pending),
            "uploaded" => Ok(UploadStatus::Uploaded),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Notification
// =============================================================================

/// Status log entry shown in the notification list.
///
/// There is at most one row per product name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Notification {
    pub id: i64,
    pub product_name: String,
    pub product_type: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Cleared on every status change, set in bulk when the list is opened.
    pub is_viewed: bool,

    pub status: UploadStatus,
}

// =============================================================================
// Caller
// =============================================================================

/// Who is invoking `add_product`.
///
/// Determines where the image attachment is read from: a foreground caller
/// hands over a raw content reference that is copied into the cache first,
/// a background drain already has a materialized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Caller {
    Foreground,
    Background,
}

impl Caller {
    pub fn is_foreground(&self) -> bool {
        matches!(self, Caller::Foreground)
    }
}

// =============================================================================
// Load State
// =============================================================================

/// Emission of a live list query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum LoadState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    /// Returns the payload of a `Ready` emission.
    pub fn ready(self) -> Option<T> {
        match self {
            LoadState::Ready(value) => Some(value),
            _ => None,
        }
    }
}
