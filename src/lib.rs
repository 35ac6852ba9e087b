//! FacturaScripts database engine.
//!
//! MySQL connection lifecycle, transaction bookkeeping, statement execution
//! and reconciliation of live column types with declared table definitions.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DbConfig};
pub use db::{ConnectionHandle, MysqlEngine};
pub use error::{DbError, DbResult};
