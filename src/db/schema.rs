//! Schema introspection and reconciliation.
//!
//! Raw `SHOW COLUMNS` rows are normalized into `ColumnDescriptor`s and compared
//! against declared `TableDefinition`s. Nothing here alters the database; the
//! result is a report for the caller to act on.

use crate::db::connection::Row;
use crate::db::types::type_match;
use crate::models::{
    ColumnDescriptor, ColumnIssue, MatchedColumn, TableDefinition, TableReport,
};
use std::collections::HashMap;

/// Reshape a raw column description into a `ColumnDescriptor`.
///
/// Every key is lower-cased, `field` becomes `name` and `null` becomes
/// `is_nullable`; all other attributes pass through.
pub fn column_from_data(raw: &Row) -> ColumnDescriptor {
    let mut map: Row = raw
        .iter()
        .map(|(key, value)| (key.to_lowercase(), value.clone()))
        .collect();

    if let Some(null) = map.shift_remove("null") {
        map.insert("is_nullable".to_string(), null);
    }
    if let Some(field) = map.shift_remove("field") {
        map.insert("name".to_string(), field);
    }

    ColumnDescriptor::from_map(map)
}

/// Compare a declared table against its live columns.
///
/// `live` is `None` when the table does not exist.
pub fn check_columns(definition: &TableDefinition, live: Option<&[ColumnDescriptor]>) -> TableReport {
    let Some(live) = live else {
        return TableReport {
            table: definition.name.clone(),
            exists: false,
            matched: Vec::new(),
            issues: definition
                .columns
                .iter()
                .map(|c| ColumnIssue::Missing {
                    column: c.name.clone(),
                })
                .collect(),
        };
    };

    let by_name: HashMap<&str, &ColumnDescriptor> =
        live.iter().map(|c| (c.name(), c)).collect();

    let mut matched = Vec::new();
    let mut issues = Vec::new();

    for declared in &definition.columns {
        let Some(column) = by_name.get(declared.name.as_str()) else {
            issues.push(ColumnIssue::Missing {
                column: declared.name.clone(),
            });
            continue;
        };

        match type_match(column.native_type(), &declared.column_type) {
            Some(rule) => matched.push(MatchedColumn {
                column: declared.name.clone(),
                rule,
            }),
            None => issues.push(ColumnIssue::TypeMismatch {
                column: declared.name.clone(),
                db_type: column.native_type().to_string(),
                xml_type: declared.column_type.clone(),
            }),
        }

        if column.is_nullable() != declared.nullable {
            issues.push(ColumnIssue::NullabilityMismatch {
                column: declared.name.clone(),
                db_nullable: column.is_nullable(),
                xml_nullable: declared.nullable,
            });
        }
    }

    for column in live {
        if !definition.columns.iter().any(|d| d.name == column.name()) {
            issues.push(ColumnIssue::Undeclared {
                column: column.name().to_string(),
            });
        }
    }

    TableReport {
        table: definition.name.clone(),
        exists: true,
        matched,
        issues,
    }
}
