//! Dossier storage.
//!
//! - [`traits`]: the [`StoreConnection`] contract the import pipeline consumes
//! - [`sqlite`]: the `SQLite` implementation, including table snapshot/restore
//! - [`cache`]: per-entity in-memory record caches

// Dropping the connection guard a few statements early buys nothing here.
#![allow(clippy::significant_drop_tightening)]

pub mod cache;
pub mod sqlite;
pub mod traits;

pub use cache::RecordCache;
pub use sqlite::SqliteStore;
pub use traits::{SqlValue, Statement, StoreConnection};
