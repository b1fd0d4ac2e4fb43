//! Store connection contract consumed by the import pipeline.

use crate::Result;
use std::fmt;

/// A value bound to a statement parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
}

impl SqlValue {
    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

/// A parameterised SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends a bound parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Blocking connection to the dossier store.
///
/// Every method returning `Err` signals a connection-level failure
/// ([`crate::Error::Connection`]); callers abort the running phase when
/// they see one.
pub trait StoreConnection {
    /// Executes a statement.
    ///
    /// Returns `Ok(false)` when the store rejected the statement because of
    /// the data it carries (constraint violation), `Ok(true)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error on any other failure.
    fn query(&self, statement: &Statement) -> Result<bool>;

    /// Executes a query and returns the first column of its first row.
    ///
    /// A query returning no row yields `0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the column is not an integer.
    fn query_int(&self, statement: &Statement) -> Result<i64>;

    /// Executes a query and returns every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn select_rows(&self, statement: &Statement) -> Result<Vec<Vec<SqlValue>>>;

    /// Copies the content of `table` into a new, uniquely named table.
    ///
    /// Returns the backup table name.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or cannot be copied.
    fn backup_table(&self, table: &str) -> Result<String>;

    /// Overwrites the content of `original` with the rows of `backup`.
    ///
    /// Returns `Ok(false)` if `backup` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the restore cannot be completed.
    fn restore_table(&self, backup: &str, original: &str) -> Result<bool>;

    /// Drops a table if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the drop fails.
    fn drop_table(&self, table: &str) -> Result<()>;

    /// Returns whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn table_exists(&self, table: &str) -> Result<bool>;
}
