//! MySQL statement text and literal helpers.

use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

pub const START_TRANSACTION: &str = "START TRANSACTION;";
pub const COMMIT: &str = "COMMIT;";
pub const ROLLBACK: &str = "ROLLBACK;";
pub const SHOW_TABLES: &str = "SHOW TABLES;";
pub const DISABLE_AUTOCOMMIT: &str = "SET autocommit = 0;";
pub const DISABLE_FOREIGN_KEYS: &str = "SET foreign_key_checks = 0;";

/// Column key under which `SHOW TABLES` reports table names.
pub fn tables_column(database: &str) -> String {
    format!("Tables_in_{}", database)
}

/// `SHOW COLUMNS` statement for one table.
pub fn show_columns(table: &str) -> String {
    format!("SHOW COLUMNS FROM {};", quote_identifier(table))
}

/// Escape a string for use inside a quoted SQL literal.
///
/// Matches the server's `real_escape_string`: NUL, newline, carriage return,
/// backslash, both quote characters and Ctrl-Z get a backslash prefix.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{1a}' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out
}

/// Number of statements in `sql`, or `None` when it cannot be parsed.
///
/// Unparsable text is left for the server to judge.
pub fn statement_count(sql: &str) -> Option<usize> {
    Parser::parse_sql(&MySqlDialect {}, sql)
        .ok()
        .map(|statements| statements.len())
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('`', "``");
    format!("`{escaped}`")
}
