//! `SQLite` dossier store.

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, ToSql, params_from_iter};
use uuid::Uuid;

use super::connection::{acquire_lock, checked_identifier, configure_connection};
use super::metrics::record_operation_metrics;
use crate::storage::traits::{SqlValue, Statement, StoreConnection};
use crate::{Error, Result};

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            SqlValue::Text(String::from_utf8_lossy(t).into_owned())
        },
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// `SQLite`-backed dossier store.
///
/// Holds a single connection behind a mutex. The import pipeline assumes a
/// single writer per entity type; the mutex only keeps the connection safe
/// to share.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a dossier database and applies `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema fails.
    pub fn open(path: impl AsRef<Path>, schema: &str) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| Error::connection("open", e))?;
        configure_connection(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema(schema)?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing) and applies `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema fails.
    pub fn in_memory(schema: &str) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::connection("open_in_memory", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema(schema)?;
        Ok(store)
    }

    fn initialize_schema(&self, schema: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(schema)
            .map_err(|e| Error::connection("initialize_schema", e))
    }

    /// Returns every row of `table` ordered by `order_by`.
    ///
    /// # Errors
    ///
    /// Returns an error if either identifier is invalid or the query fails.
    pub fn rows(&self, table: &str, order_by: &str) -> Result<Vec<Vec<SqlValue>>> {
        let table = checked_identifier(table)?;
        let order_by = checked_identifier(order_by)?;
        self.select_rows(&Statement::new(format!(
            "SELECT * FROM {table} ORDER BY {order_by}"
        )))
    }
}

impl StoreConnection for SqliteStore {
    fn query(&self, statement: &Statement) -> Result<bool> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        match conn.execute(&statement.sql, params_from_iter(statement.params.iter())) {
            Ok(_) => {
                record_operation_metrics("query", start, "success");
                Ok(true)
            },
            Err(e) if is_constraint_violation(&e) => {
                record_operation_metrics("query", start, "rejected");
                tracing::debug!(sql = %statement.sql, error = %e, "Statement rejected");
                Ok(false)
            },
            Err(e) => {
                record_operation_metrics("query", start, "error");
                Err(Error::connection("query", e))
            },
        }
    }

    fn query_int(&self, statement: &Statement) -> Result<i64> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = conn
            .query_row(
                &statement.sql,
                params_from_iter(statement.params.iter()),
                |row| row.get::<_, i64>(0),
            )
            .optional();
        match result {
            Ok(value) => {
                record_operation_metrics("query_int", start, "success");
                Ok(value.unwrap_or(0))
            },
            Err(e) => {
                record_operation_metrics("query_int", start, "error");
                Err(Error::connection("query_int", e))
            },
        }
    }

    fn select_rows(&self, statement: &Statement) -> Result<Vec<Vec<SqlValue>>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = (|| {
            let mut stmt = conn.prepare(&statement.sql)?;
            let columns = stmt.column_count();
            let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).map(sql_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })();
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("select_rows", start, status);
        result.map_err(|e| Error::connection("select_rows", e))
    }

    fn backup_table(&self, table: &str) -> Result<String> {
        let table = checked_identifier(table)?;
        let backup = format!("{table}__bak_{}", Uuid::new_v4().simple());
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = conn.execute_batch(&format!(
            "CREATE TABLE {backup} AS SELECT * FROM {table};"
        ));
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("backup_table", start, status);
        result.map_err(|e| Error::connection("backup_table", e))?;
        metrics::counter!("store_backups_total").increment(1);
        tracing::debug!(table, backup = %backup, "Table snapshot taken");
        Ok(backup)
    }

    fn restore_table(&self, backup: &str, original: &str) -> Result<bool> {
        let backup = checked_identifier(backup)?;
        let original = checked_identifier(original)?;
        if !self.table_exists(backup)? {
            return Ok(false);
        }
        let start = Instant::now();
        let mut conn = acquire_lock(&self.conn);
        let result = (|| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {original}"), [])?;
            tx.execute(
                &format!("INSERT INTO {original} SELECT * FROM {backup}"),
                [],
            )?;
            tx.commit()
        })();
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("restore_table", start, status);
        result.map_err(|e| Error::connection("restore_table", e))?;
        tracing::debug!(table = original, backup, "Table restored from snapshot");
        Ok(true)
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        let table = checked_identifier(table)?;
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .map_err(|e| Error::connection("drop_table", e))
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .map_err(|e| Error::connection("table_exists", e))
    }
}
