//! Connection handles and the driver seam.
//!
//! A `ConnectionHandle` wraps one live database session. The session itself
//! is a `Session` trait object produced by a `Connector`, so the engine logic
//! stays independent of the wire driver. The MySQL implementation lives in
//! the `mysql` module.

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// One result row: column name to value, in the order reported by the driver.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A live database session as seen by the engine.
#[async_trait]
pub trait Session: Send {
    /// Run one or more semicolon-separated statements that produce no rows.
    ///
    /// Implementations must consume every result set of the batch before
    /// returning, on both the success and the error path, and fail if any
    /// statement of the batch fails. Returns the total rows affected.
    async fn execute(&mut self, sql: &str) -> DbResult<u64>;

    /// Run one query and return all of its rows.
    async fn query(&mut self, sql: &str) -> DbResult<Vec<Row>>;

    /// Server version string as reported by the live session.
    async fn server_version(&mut self) -> DbResult<String>;

    /// Terminate the session.
    async fn close(self: Box<Self>) -> DbResult<()>;
}

/// Opens sessions for a configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: &DbConfig) -> DbResult<Box<dyn Session>>;
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

pub(crate) struct HandleState {
    session: Option<Box<dyn Session>>,
    last_error: Option<String>,
}

impl HandleState {
    /// The open session, or `Closed` once the handle has been closed.
    pub(crate) fn session(&mut self, id: HandleId) -> DbResult<&mut Box<dyn Session>> {
        self.session.as_mut().ok_or_else(|| DbError::closed(id))
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref().filter(|m| !m.is_empty())
    }

    /// Take the session out, leaving the handle closed.
    pub(crate) fn take_session(&mut self) -> Option<Box<dyn Session>> {
        self.session.take()
    }
}

/// Reference to one live database session.
///
/// Cloning is cheap and yields the same handle: equality and hashing are by
/// `HandleId`. Operations on one handle are serialized by an internal lock.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: HandleId,
    state: Arc<Mutex<HandleState>>,
}

impl ConnectionHandle {
    /// Wrap an open session in a new handle.
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            id: HandleId::next(),
            state: Arc::new(Mutex::new(HandleState {
                session: Some(session),
                last_error: None,
            })),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Native last-error text of this handle, empty when the last statement succeeded.
    pub async fn last_error(&self) -> String {
        self.state
            .lock()
            .await
            .last_error()
            .unwrap_or_default()
            .to_string()
    }

    /// Whether the session has not been closed yet.
    pub async fn is_open(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().await
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl std::hash::Hash for ConnectionHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
