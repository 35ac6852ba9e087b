//! MySQL engine façade.
//!
//! `MysqlEngine` owns the configuration, the driver connector, the registry of
//! open transactions and a fallback error message. Callers get connection
//! handles from `connect` and pass them back into every other operation.
//!
//! The boolean and empty-result operations (`exec`, `select`, `commit`, ...)
//! never return errors; failures are logged and left for `error_message`.
//! The `try_*` forms return the error instead.

use crate::config::DbConfig;
use crate::db::connection::{ConnectionHandle, Connector, Row, Session};
use crate::db::executor;
use crate::db::schema;
use crate::db::sql;
use crate::db::transaction_registry::{TransactionMetadata, TransactionRegistry};
use crate::db::types;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, TableDefinition, TableReport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Connector used when the crate is built without a MySQL driver.
#[cfg_attr(feature = "mysql", allow(dead_code))]
struct UnavailableConnector;

#[async_trait]
impl Connector for UnavailableConnector {
    async fn open(&self, _config: &DbConfig) -> DbResult<Box<dyn Session>> {
        Err(DbError::DriverUnavailable)
    }
}

fn default_connector() -> Arc<dyn Connector> {
    #[cfg(feature = "mysql")]
    {
        Arc::new(crate::db::mysql::MySqlConnector)
    }
    #[cfg(not(feature = "mysql"))]
    {
        Arc::new(UnavailableConnector)
    }
}

pub struct MysqlEngine {
    config: DbConfig,
    connector: Arc<dyn Connector>,
    transactions: TransactionRegistry,
    /// Message of the most recent failure on any handle of this engine
    last_error: RwLock<String>,
}

impl MysqlEngine {
    /// Create an engine using the MySQL driver.
    pub fn new(config: DbConfig) -> Self {
        Self::with_connector(config, default_connector())
    }

    /// Create an engine with a custom session connector.
    pub fn with_connector(config: DbConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            transactions: TransactionRegistry::new(),
            last_error: RwLock::new(String::new()),
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    async fn record_error(&self, err: &DbError) {
        *self.last_error.write().await = err.to_string();
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open a session and apply the session settings.
    ///
    /// Autocommit is always disabled; foreign key checks are disabled when
    /// the configuration asks for it.
    pub async fn connect(&self) -> DbResult<ConnectionHandle> {
        let target = self.config.masked_url();

        let session = match self.connector.open(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                error!(db = %target, error = %e, "Connection failed");
                self.record_error(&e).await;
                return Err(e);
            }
        };
        let handle = ConnectionHandle::new(session);

        let mut settings = vec![sql::DISABLE_AUTOCOMMIT];
        if !self.config.foreign_keys {
            settings.push(sql::DISABLE_FOREIGN_KEYS);
        }
        for statement in settings {
            if let Err(e) = executor::execute(&handle, statement).await {
                error!(db = %target, error = %e, "Session setup failed");
                self.record_error(&e).await;
                if let Err(close_err) = executor::close(&handle).await {
                    warn!(handle = %handle.id(), error = %close_err, "Failed to close session");
                }
                return Err(e);
            }
        }

        info!(
            handle = %handle.id(),
            db = %target,
            foreign_keys = self.config.foreign_keys,
            "Connected"
        );
        Ok(handle)
    }

    /// Roll back this handle's open transaction, if any, then close it.
    ///
    /// Returns the outcome of closing the session; false when the handle
    /// was already closed.
    pub async fn close(&self, handle: &ConnectionHandle) -> bool {
        if self.transactions.contains(handle).await {
            self.rollback(handle).await;
        }

        match executor::close(handle).await {
            Ok(closed) => {
                if closed {
                    info!(handle = %handle.id(), "Connection closed");
                } else {
                    debug!(handle = %handle.id(), "Connection already closed");
                }
                closed
            }
            Err(e) => {
                warn!(handle = %handle.id(), error = %e, "Failed to close connection");
                self.record_error(&e).await;
                false
            }
        }
    }

    /// Roll back every open transaction. Call before dropping the engine.
    pub async fn shutdown(&self) {
        let open = self.transactions.count().await;
        if open > 0 {
            info!(open, "Rolling back open transactions");
        }
        self.rollback_all().await;
    }

    // =========================================================================
    // Statement execution
    // =========================================================================

    /// Run a statement batch, returning the rows affected.
    pub async fn try_exec(&self, handle: &ConnectionHandle, sql: &str) -> DbResult<u64> {
        executor::execute(handle, sql).await
    }

    /// Run a statement batch. False on any failure.
    pub async fn exec(&self, handle: &ConnectionHandle, sql: &str) -> bool {
        match self.try_exec(handle, sql).await {
            Ok(_) => true,
            Err(e) => {
                self.record_error(&e).await;
                false
            }
        }
    }

    /// Run a query, returning its rows.
    pub async fn try_select(&self, handle: &ConnectionHandle, sql: &str) -> DbResult<Vec<Row>> {
        executor::query(handle, sql).await
    }

    /// Run a query. Empty on failure; check `error_message` to tell
    /// the two apart.
    pub async fn select(&self, handle: &ConnectionHandle, sql: &str) -> Vec<Row> {
        match self.try_select(handle, sql).await {
            Ok(rows) => rows,
            Err(e) => {
                self.record_error(&e).await;
                Vec::new()
            }
        }
    }

    /// Last error of the handle, or the engine's most recent failure when the
    /// handle has none.
    pub async fn error_message(&self, handle: &ConnectionHandle) -> String {
        let own = handle.last_error().await;
        if !own.is_empty() {
            return own;
        }
        self.last_error.read().await.clone()
    }

    /// Escape a value for use inside a quoted SQL string literal.
    ///
    /// Sessions always use the same character set, so escaping does not
    /// depend on the handle.
    pub fn escape_string(&self, value: &str) -> String {
        sql::escape_string(value)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Start a transaction and track it. False (and untracked) on failure.
    pub async fn begin_transaction(&self, handle: &ConnectionHandle) -> bool {
        if !self.exec(handle, sql::START_TRANSACTION).await {
            return false;
        }
        self.transactions.register(handle).await;
        info!(handle = %handle.id(), "Transaction started");
        true
    }

    /// Commit. The handle stops being tracked once the commit was attempted.
    pub async fn commit(&self, handle: &ConnectionHandle) -> bool {
        let ok = self.exec(handle, sql::COMMIT).await;
        if self.transactions.remove(handle).await {
            info!(handle = %handle.id(), committed = ok, "Transaction finished");
        }
        ok
    }

    /// Roll back. The handle stops being tracked once the rollback was attempted.
    pub async fn rollback(&self, handle: &ConnectionHandle) -> bool {
        let ok = self.exec(handle, sql::ROLLBACK).await;
        if self.transactions.remove(handle).await {
            info!(handle = %handle.id(), rolled_back = ok, "Transaction finished");
        }
        ok
    }

    /// Whether the handle has a tracked open transaction. No I/O.
    pub async fn in_transaction(&self, handle: &ConnectionHandle) -> bool {
        self.transactions.contains(handle).await
    }

    /// Roll back every tracked transaction in begin order.
    pub async fn rollback_all(&self) {
        for handle in self.transactions.snapshot().await {
            if !self.rollback(&handle).await {
                warn!(handle = %handle.id(), "Rollback failed during teardown");
            }
        }
    }

    /// Open transactions with their start time and age.
    pub async fn open_transactions(&self) -> Vec<TransactionMetadata> {
        self.transactions.list_all().await
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Table names of the configured database.
    pub async fn list_tables(&self, handle: &ConnectionHandle) -> Vec<String> {
        let key = sql::tables_column(&self.config.database);
        self.select(handle, sql::SHOW_TABLES)
            .await
            .into_iter()
            .filter_map(|row| match row.get(&key) {
                Some(serde_json::Value::String(name)) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Engine name and server version, e.g. `MYSQL 8.0.36`.
    ///
    /// Just `MYSQL` if the server could not be asked.
    pub async fn version(&self, handle: &ConnectionHandle) -> String {
        match executor::server_version(handle).await {
            Ok(version) => format!("MYSQL {}", version),
            Err(e) => {
                self.record_error(&e).await;
                "MYSQL".to_string()
            }
        }
    }

    /// Whether a live column type satisfies a declared one.
    pub fn compare_data_types(&self, db_type: &str, xml_type: &str) -> bool {
        types::compare_data_types(db_type, xml_type)
    }

    /// Normalize one raw `SHOW COLUMNS` row.
    pub fn column_from_data(&self, raw: &Row) -> ColumnDescriptor {
        schema::column_from_data(raw)
    }

    /// Normalized columns of a table.
    pub async fn columns(
        &self,
        handle: &ConnectionHandle,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        if table.is_empty() {
            return Err(DbError::invalid_input("Table name must not be empty"));
        }
        let rows = self
            .try_select(handle, &sql::show_columns(table))
            .await
            .map_err(|e| DbError::schema(e.to_string(), table))?;
        Ok(rows.iter().map(schema::column_from_data).collect())
    }

    /// Compare a declared table with the live one.
    pub async fn check_table(
        &self,
        handle: &ConnectionHandle,
        definition: &TableDefinition,
    ) -> DbResult<TableReport> {
        let tables = self.try_select(handle, sql::SHOW_TABLES).await?;
        let key = sql::tables_column(&self.config.database);
        let exists = tables
            .iter()
            .any(|row| row.get(&key).and_then(|v| v.as_str()) == Some(definition.name.as_str()));

        if !exists {
            debug!(table = %definition.name, "Declared table does not exist");
            return Ok(schema::check_columns(definition, None));
        }

        let live = self.columns(handle, &definition.name).await?;
        Ok(schema::check_columns(definition, Some(live.as_slice())))
    }
}

impl Drop for MysqlEngine {
    fn drop(&mut self) {
        let Some(handles) = self.transactions.try_drain() else {
            warn!("Transaction registry busy at drop; open transactions not rolled back");
            return;
        };
        if handles.is_empty() {
            return;
        }

        // Best effort: spawn the rollbacks if a runtime is still around
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let count = handles.len();
                runtime.spawn(async move {
                    for handle in handles {
                        if let Err(e) = executor::execute(&handle, sql::ROLLBACK).await {
                            warn!(handle = %handle.id(), error = %e, "Rollback on drop failed");
                        }
                    }
                });
                warn!(
                    count,
                    "Engine dropped with open transactions - consider calling shutdown()"
                );
            }
            Err(_) => {
                warn!(
                    count = handles.len(),
                    "Engine dropped outside a runtime; open transactions left to the server"
                );
            }
        }
    }
}
