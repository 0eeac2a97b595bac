//! On-disk storage subsystem.
//!
//! # Data Flow
//! ```text
//! rules service
//!     → fs.rs (atomic write of {dynamic}/{name}.yaml)
//!     → backup.rs (snapshot before overwrite/delete, prune to max_backups)
//!     → index.rs ({metadata}/index.json, whole-document rewrite)
//! ```
//!
//! # Design Decisions
//! - Every write of a file another process may read goes through `atomic_write`
//! - Helpers treat "not found" as a value, not an error

pub mod backup;
pub mod fs;
pub mod index;

pub use backup::BackupStore;
pub use index::{IndexError, IndexStore};
