//! `SQLite` implementation of the dossier store.
//!
//! - [`connection`]: lock acquisition, pragma configuration, identifier checks
//! - [`store`]: [`SqliteStore`], the [`StoreConnection`](crate::storage::StoreConnection) implementation
//! - [`metrics`]: per-operation metrics

mod connection;
mod metrics;
mod store;

pub use connection::{acquire_lock, checked_identifier, configure_connection};
pub use metrics::record_operation_metrics;
pub use store::SqliteStore;
