//! Connection handling for the `SQLite` dossier store.

use crate::{Error, Result};
use regex::Regex;
use rusqlite::Connection;
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Plain SQL identifier: letters, digits and underscores, not starting with a digit.
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").unwrap_or_else(|_| unreachable!())
});

/// Acquires a mutex lock, recovering from poisoning.
///
/// A poisoned lock means an earlier critical section panicked; the
/// connection itself is still usable, so the inner value is recovered and
/// the event is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies WAL journaling, NORMAL synchronous mode and a 5 second busy timeout.
///
/// Pragma results are ignored: in-memory databases report `memory` as their
/// journal mode and that is fine.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    Ok(())
}

/// Validates a table name before it is interpolated into SQL.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for anything but a plain identifier.
pub fn checked_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!("invalid table name: {name:?}")))
    }
}
