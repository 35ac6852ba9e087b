//! Scripted in-memory session shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use facturascripts_db::config::DbConfig;
use facturascripts_db::db::{Connector, Row, Session};
use facturascripts_db::error::{DbError, DbResult};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Script {
    statements: Vec<String>,
    fail_on: Vec<String>,
    rows: HashMap<String, Vec<Row>>,
    version: String,
    refuse: Option<String>,
    opened: usize,
    closed: usize,
}

/// Fake server: every session it opens shares one script and one log.
///
/// Batches are split on `;` and each statement is logged without the
/// terminator. A statement containing a `fail_on` pattern fails and stops
/// the batch.
#[derive(Clone)]
pub struct FakeDb {
    script: Arc<Mutex<Script>>,
}

impl FakeDb {
    pub fn new() -> Self {
        let script = Script {
            version: "8.0.36".to_string(),
            ..Script::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn fail_on(&self, pattern: &str) {
        self.script.lock().unwrap().fail_on.push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        self.script.lock().unwrap().fail_on.clear();
    }

    /// Rows returned for a query, keyed by the statement without `;`.
    pub fn with_rows(&self, sql: &str, rows: Vec<Row>) {
        self.script.lock().unwrap().rows.insert(sql.to_string(), rows);
    }

    pub fn refuse_connections(&self, message: &str) {
        self.script.lock().unwrap().refuse = Some(message.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.script.lock().unwrap().statements.clone()
    }

    pub fn count(&self, statement: &str) -> usize {
        self.statements().iter().filter(|s| *s == statement).count()
    }

    pub fn clear_log(&self) {
        self.script.lock().unwrap().statements.clear();
    }

    pub fn opened(&self) -> usize {
        self.script.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.script.lock().unwrap().closed
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Log the batch statement by statement; stop at the first failure.
    fn run(&self, sql: &str) -> DbResult<Vec<String>> {
        let mut script = self.script.lock().unwrap();
        let mut ran = Vec::new();
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            script.statements.push(statement.to_string());
            if script.fail_on.iter().any(|p| statement.contains(p.as_str())) {
                return Err(DbError::statement(
                    format!("You have an error in your SQL syntax near '{}'", statement),
                    Some("42000".to_string()),
                    "Check the SQL syntax and referenced objects",
                ));
            }
            ran.push(statement.to_string());
        }
        Ok(ran)
    }
}

#[async_trait]
impl Connector for FakeDb {
    async fn open(&self, _config: &DbConfig) -> DbResult<Box<dyn Session>> {
        let mut script = self.script.lock().unwrap();
        if let Some(message) = &script.refuse {
            return Err(DbError::connection(
                message.clone(),
                "Verify the database user and password",
            ));
        }
        script.opened += 1;
        Ok(Box::new(FakeSession { db: self.clone() }))
    }
}

struct FakeSession {
    db: FakeDb,
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        Ok(self.db.run(sql)?.len() as u64)
    }

    async fn query(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        let ran = self.db.run(sql)?;
        let script = self.db.script.lock().unwrap();
        Ok(ran
            .last()
            .and_then(|statement| script.rows.get(statement))
            .cloned()
            .unwrap_or_default())
    }

    async fn server_version(&mut self) -> DbResult<String> {
        Ok(self.db.script.lock().unwrap().version.clone())
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        self.db.script.lock().unwrap().closed += 1;
        Ok(())
    }
}

pub fn row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn config() -> DbConfig {
    DbConfig {
        database: "facturascripts".to_string(),
        ..DbConfig::default()
    }
}
