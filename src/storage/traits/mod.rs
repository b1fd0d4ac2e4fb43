//! Storage traits.

mod store;

pub use store::{SqlValue, Statement, StoreConnection};
