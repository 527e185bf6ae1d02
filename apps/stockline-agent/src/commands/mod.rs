//! # Agent Commands
//!
//! One module per area, one function per subcommand.
//!
//! ```text
//! commands/
//! ├── mod.rs           ◄─── You are here (exports)
//! ├── product.rs       ◄─── add, list, refresh
//! ├── notification.rs  ◄─── notifications [--mark-viewed]
//! └── sync.rs          ◄─── drain, pending, run
//! ```
//!
//! Every command returns a report that is both `Serialize` (for `--json`)
//! and `Display` (for people).

pub mod notification;
pub mod product;
pub mod sync;
