//! Column type compatibility between the live database and declared schemas.
//!
//! Table definitions declare abstract types (`character varying(50)`,
//! `INTEGER`, `double precision`, `boolean`, ...) while MySQL reports its
//! native types (`varchar(50)`, `int(11)`, `double`, `tinyint(1)`, ...).
//! Both strings are parsed into a name and an optional parenthesized size and
//! compared through a fixed list of equivalence rules.

/// A column type split into its name and optional size.
///
/// `varchar(50)` parses to name `varchar` and size `50`; `double precision`
/// has no size. The size is kept verbatim (`10,2` for decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlType<'a> {
    pub name: &'a str,
    pub size: Option<&'a str>,
}

impl<'a> SqlType<'a> {
    pub fn parse(type_str: &'a str) -> Self {
        let trimmed = type_str.trim();
        if let Some(open) = trimmed.find('(') {
            if let Some(close) = trimmed.rfind(')') {
                if close > open {
                    return Self {
                        name: trimmed[..open].trim_end(),
                        size: Some(trimmed[open + 1..close].trim()),
                    };
                }
            }
        }
        Self {
            name: trimmed,
            size: None,
        }
    }

    fn is_sized(&self) -> bool {
        self.size.is_some_and(|s| !s.is_empty())
    }
}

/// Which equivalence rule made two types compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMatch {
    /// Identical strings
    Exact,
    /// `tinyint(1)` stored for a declared `boolean`
    Boolean,
    /// `varchar(N)` / `char(N)` for `character varying(N)`
    SizedCharacter,
    /// `int(N)` for `INTEGER`, `double*` for `double precision`
    Numeric,
    /// Any `varchar(..)` / `char(..)` for `character varying(..)`
    Character,
}

const DECLARED_VARCHAR: &str = "character varying";
const NATIVE_CHARACTER: [&str; 2] = ["varchar", "char"];

/// Decide whether a native database type satisfies a declared type.
///
/// Rules are tried in order and the first one that matches is returned.
pub fn type_match(db_type: &str, xml_type: &str) -> Option<TypeMatch> {
    if db_type == xml_type {
        return Some(TypeMatch::Exact);
    }
    if db_type == "tinyint(1)" && xml_type == "boolean" {
        return Some(TypeMatch::Boolean);
    }

    let db = SqlType::parse(db_type);
    let xml = SqlType::parse(xml_type);

    // Sized matches are a subset of the character family below; this rule only
    // labels them (see "Sized-character rule" in DESIGN.md)
    if is_declared_varchar(&xml)
        && is_native_character(&db)
        && db.is_sized()
        && db.size == xml.size
    {
        return Some(TypeMatch::SizedCharacter);
    }

    if is_numeric_equivalent(db_type, xml_type) {
        return Some(TypeMatch::Numeric);
    }

    if is_declared_varchar(&xml) && is_native_character(&db) {
        return Some(TypeMatch::Character);
    }

    None
}

/// Returns true if the native type is equivalent to the declared one.
pub fn compare_data_types(db_type: &str, xml_type: &str) -> bool {
    type_match(db_type, xml_type).is_some()
}

fn is_declared_varchar(xml: &SqlType<'_>) -> bool {
    xml.name == DECLARED_VARCHAR && xml.size.is_some()
}

fn is_native_character(db: &SqlType<'_>) -> bool {
    NATIVE_CHARACTER.contains(&db.name) && db.size.is_some()
}

fn is_numeric_equivalent(db_type: &str, xml_type: &str) -> bool {
    let db = SqlType::parse(db_type);
    (db.name == "int" && db.size.is_some() && xml_type == "INTEGER")
        || (db_type.starts_with("double") && xml_type == "double precision")
}
