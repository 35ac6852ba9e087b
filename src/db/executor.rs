//! Statement execution on a connection handle.
//!
//! Every call locks the handle for its whole duration, so statements on one
//! handle never interleave. The handle's last-error text is updated after each
//! call: set on failure, cleared on success.

use crate::db::connection::{ConnectionHandle, Row};
use crate::db::sql;
use crate::error::{DbError, DbResult};
use std::time::Instant;
use tracing::{debug, warn};

/// Run a statement batch that produces no rows.
///
/// Returns the total rows affected. The session drains every result set of
/// the batch before this returns, whether or not a statement failed.
pub async fn execute(handle: &ConnectionHandle, sql: &str) -> DbResult<u64> {
    let start = Instant::now();
    let mut state = handle.lock().await;

    let result = match state.session(handle.id()) {
        Ok(session) => session.execute(sql).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(rows_affected) => {
            state.clear_error();
            debug!(
                handle = %handle.id(),
                rows_affected,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Statement executed"
            );
        }
        Err(e) => {
            state.set_error(e.to_string());
            warn!(handle = %handle.id(), sql = %sql, error = %e, "Statement failed");
        }
    }
    result
}

/// Error for a query text holding more than one statement.
pub(crate) fn multiple_statements(count: usize) -> DbError {
    DbError::statement(
        format!("A query must be a single statement, got {}", count),
        None,
        "Run each query separately, or use exec for statement batches",
    )
}

/// Run a single query and collect every row.
///
/// Text holding several statements is rejected before it reaches the server.
pub async fn query(handle: &ConnectionHandle, sql: &str) -> DbResult<Vec<Row>> {
    let start = Instant::now();
    let mut state = handle.lock().await;

    let result = match sql::statement_count(sql) {
        Some(count) if count > 1 => Err(multiple_statements(count)),
        _ => match state.session(handle.id()) {
            Ok(session) => session.query(sql).await,
            Err(e) => Err(e),
        },
    };

    match &result {
        Ok(rows) => {
            state.clear_error();
            debug!(
                handle = %handle.id(),
                rows = rows.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Query executed"
            );
        }
        Err(e) => {
            state.set_error(e.to_string());
            warn!(handle = %handle.id(), sql = %sql, error = %e, "Query failed");
        }
    }
    result
}

/// Server version reported by the live session.
pub async fn server_version(handle: &ConnectionHandle) -> DbResult<String> {
    let mut state = handle.lock().await;
    let result = match state.session(handle.id()) {
        Ok(session) => session.server_version().await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        state.set_error(e.to_string());
    }
    result
}

/// Close the session held by the handle.
///
/// Returns `Ok(false)` when the handle was already closed; the session is
/// never closed twice.
pub async fn close(handle: &ConnectionHandle) -> DbResult<bool> {
    let session = handle.lock().await.take_session();
    match session {
        Some(session) => {
            session.close().await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
