//! # Repository Module
//!
//! Table access for the local store.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  every write:   feed.lock_writes() ─► SQL (one tx) ─► feed.publish()   │
//! │  every read:    straight to the pool, no lock                          │
//! │  live queries:  feed.live(table, read) ─► BoxStream                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product cache, replaced wholesale
//! - [`PendingUploadRepository`] - Offline write queue
//! - [`NotificationRepository`] - Upload status log

pub mod notification;
pub mod pending;
pub mod product;

pub use notification::NotificationRepository;
pub use pending::PendingUploadRepository;
pub use product::ProductRepository;
