//! Database layer.
//!
//! This module provides:
//! - The session seam and connection handles
//! - Statement execution with per-handle error tracking
//! - The transaction registry
//! - Schema type comparison and column normalization
//! - The `MysqlEngine` façade tying them together

pub mod connection;
pub mod engine;
pub mod executor;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod schema;
pub mod sql;
pub mod transaction_registry;
pub mod types;

pub use connection::{ConnectionHandle, Connector, HandleId, Row, Session};
pub use engine::MysqlEngine;
#[cfg(feature = "mysql")]
pub use mysql::MySqlConnector;
pub use schema::{check_columns, column_from_data};
pub use transaction_registry::{TransactionMetadata, TransactionRegistry};
pub use types::{SqlType, TypeMatch, compare_data_types, type_match};
