//! Registry of connection handles with an open transaction.
//!
//! Entries are kept in begin order so that teardown rolls transactions back
//! in the order they were started. Membership and removal are keyed by
//! `HandleId`. The registry only does bookkeeping; the engine issues the
//! `START TRANSACTION` / `COMMIT` / `ROLLBACK` statements.

use crate::db::connection::{ConnectionHandle, HandleId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

struct OpenTransaction {
    handle: ConnectionHandle,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Metadata about an open transaction (for listing without touching the session).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionMetadata {
    /// Handle the transaction runs on
    pub handle: String,
    /// When the transaction started (absolute time)
    pub started_at: DateTime<Utc>,
    /// Seconds since the transaction started
    pub duration_secs: u64,
}

#[derive(Clone, Default)]
pub struct TransactionRegistry {
    transactions: Arc<RwLock<IndexMap<HandleId, OpenTransaction>>>,
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `handle` has an open transaction.
    ///
    /// Returns false when the handle was already registered; its original
    /// position and start time are kept.
    pub async fn register(&self, handle: &ConnectionHandle) -> bool {
        let mut txs = self.transactions.write().await;
        if txs.contains_key(&handle.id()) {
            return false;
        }
        txs.insert(
            handle.id(),
            OpenTransaction {
                handle: handle.clone(),
                started_at: Utc::now(),
                started: Instant::now(),
            },
        );
        debug!(handle = %handle.id(), open = txs.len(), "Transaction registered");
        true
    }

    /// Forget the transaction of `handle`. Returns whether it was registered.
    pub async fn remove(&self, handle: &ConnectionHandle) -> bool {
        let mut txs = self.transactions.write().await;
        let removed = txs.shift_remove(&handle.id()).is_some();
        if removed {
            debug!(handle = %handle.id(), open = txs.len(), "Transaction unregistered");
        }
        removed
    }

    /// Pure membership test.
    pub async fn contains(&self, handle: &ConnectionHandle) -> bool {
        self.transactions.read().await.contains_key(&handle.id())
    }

    /// Handles with an open transaction, in begin order.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.transactions
            .read()
            .await
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// List all open transactions with their metadata.
    pub async fn list_all(&self) -> Vec<TransactionMetadata> {
        self.transactions
            .read()
            .await
            .values()
            .map(|entry| TransactionMetadata {
                handle: entry.handle.id().to_string(),
                started_at: entry.started_at,
                duration_secs: entry.started.elapsed().as_secs(),
            })
            .collect()
    }

    /// Get the number of open transactions.
    pub async fn count(&self) -> usize {
        self.transactions.read().await.len()
    }

    /// Remove and return every handle without waiting for the lock.
    ///
    /// Used from `Drop`, where awaiting is not possible. Returns `None` if the
    /// registry is currently locked.
    pub fn try_drain(&self) -> Option<Vec<ConnectionHandle>> {
        let mut txs = self.transactions.try_write().ok()?;
        Some(txs.drain(..).map(|(_, entry)| entry.handle).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::{Row, Session};
    use crate::error::DbResult;
    use async_trait::async_trait;

    struct NullSession;

    #[async_trait]
    impl Session for NullSession {
        async fn execute(&mut self, _sql: &str) -> DbResult<u64> {
            Ok(0)
        }

        async fn query(&mut self, _sql: &str) -> DbResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn server_version(&mut self) -> DbResult<String> {
            Ok(String::new())
        }

        async fn close(self: Box<Self>) -> DbResult<()> {
            Ok(())
        }
    }

    fn handle() -> ConnectionHandle {
        ConnectionHandle::new(Box::new(NullSession))
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = TransactionRegistry::new();
        assert_eq!(registry.count().await, 0);
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = TransactionRegistry::new();
        let h = handle();

        assert!(registry.register(&h).await);
        assert!(registry.contains(&h).await);

        assert!(registry.remove(&h).await);
        assert!(!registry.contains(&h).await);
        assert!(!registry.remove(&h).await);
    }

    #[tokio::test]
    async fn test_handle_appears_at_most_once() {
        let registry = TransactionRegistry::new();
        let h = handle();

        assert!(registry.register(&h).await);
        assert!(!registry.register(&h.clone()).await);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_begin_order() {
        let registry = TransactionRegistry::new();
        let (a, b, c) = (handle(), handle(), handle());

        registry.register(&b).await;
        registry.register(&a).await;
        registry.register(&c).await;
        registry.remove(&a).await;
        registry.register(&a).await;

        assert_eq!(registry.snapshot().await, vec![b, c, a]);
    }

    #[tokio::test]
    async fn test_list_all_returns_metadata() {
        let registry = TransactionRegistry::new();
        let h = handle();
        registry.register(&h).await;

        let list = registry.list_all().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].handle, h.id().to_string());
        assert!(list[0].started_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_try_drain_empties_registry() {
        let registry = TransactionRegistry::new();
        let (a, b) = (handle(), handle());
        registry.register(&a).await;
        registry.register(&b).await;

        let drained = registry.try_drain().unwrap();
        assert_eq!(drained, vec![a, b]);
        assert_eq!(registry.count().await, 0);
        assert_eq!(registry.try_drain().unwrap(), Vec::new());
    }
}
