//! Data models for the database engine.
//!
//! This module re-exports all model types used throughout the crate.

pub mod schema;

pub use schema::{
    ColumnDescriptor, ColumnIssue, DeclaredColumn, MatchedColumn, TableDefinition, TableReport,
};
