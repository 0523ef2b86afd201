use bson::Document as BsonDocument;
use std::collections::BTreeMap;

use crate::errors::DbError;

const MAX_TABLE_NAME_LEN: usize = 64;

/// Tables served when the configuration lists none.
pub const DEFAULT_TABLES: [&str; 15] = [
    "about",
    "academics",
    "admissions",
    "alumni",
    "contacts",
    "events",
    "faculty",
    "gallery",
    "news",
    "pages",
    "settings",
    "staff",
    "students",
    "testimonials",
    "users",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSpec {
    /// Field values applied to newly inserted records that do not carry them.
    pub defaults: BsonDocument,
}

/// Allowlist of tables exposed over HTTP.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, TableSpec>,
    allow_any: bool,
}

impl TableRegistry {
    #[must_use]
    pub fn new(allow_any: bool) -> Self {
        Self { tables: BTreeMap::new(), allow_any }
    }

    /// Registry over [`DEFAULT_TABLES`], none of them with defaults.
    #[must_use]
    pub fn with_default_tables(allow_any: bool) -> Self {
        let mut reg = Self::new(allow_any);
        for name in DEFAULT_TABLES {
            reg.tables.insert(name.to_string(), TableSpec::default());
        }
        reg
    }

    /// # Errors
    /// Returns `DbError::InvalidTable` if `name` is not a valid table name.
    pub fn register(&mut self, name: &str, spec: TableSpec) -> Result<(), DbError> {
        validate_table_name(name)?;
        self.tables.insert(name.to_string(), spec);
        Ok(())
    }

    /// Looks up a table's insert defaults.
    ///
    /// # Errors
    /// Returns `DbError::InvalidTable` for malformed names and for names that are not
    /// registered while `allow_any` is off.
    pub fn resolve(&self, name: &str) -> Result<BsonDocument, DbError> {
        validate_table_name(name)?;
        match self.tables.get(name) {
            Some(spec) => Ok(spec.defaults.clone()),
            None if self.allow_any => Ok(BsonDocument::new()),
            None => Err(DbError::InvalidTable(format!("unknown table '{name}'"))),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    #[must_use]
    pub const fn allow_any(&self) -> bool {
        self.allow_any
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Names are a lowercase letter followed by up to 63 lowercase letters, digits or `_`.
///
/// # Errors
/// Returns `DbError::InvalidTable` describing the first violation.
pub fn validate_table_name(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(DbError::InvalidTable("table name must not be empty".into()));
    };
    if !first.is_ascii_lowercase() {
        return Err(DbError::InvalidTable(format!("table name '{name}' must start with a lowercase letter")));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(DbError::InvalidTable(format!("table name exceeds {MAX_TABLE_NAME_LEN} characters")));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')) {
        return Err(DbError::InvalidTable(format!("table name '{name}' contains '{bad}'")));
    }
    Ok(())
}
