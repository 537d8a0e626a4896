//! SQL dialect translation
//!
//! The canonical schema is expressed with [`ColumnType`]; every backend
//! difference in type names, quoting and parameter placeholders is resolved
//! here and nowhere else.

use crate::schema::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Canonical type -> backend type string
    pub fn type_name(self, col_type: ColumnType) -> &'static str {
        match (self, col_type) {
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::KeyText) => "TEXT",
            (Dialect::Sqlite, ColumnType::Serial) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
            (Dialect::Postgres, ColumnType::KeyText) => "VARCHAR(255)",
            (Dialect::Postgres, ColumnType::Serial) => {
                "BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"
            }
        }
    }

    /// Quote an identifier, doubling embedded quotes
    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Whether FOREIGN KEY constraints can be added to an existing table
    pub fn can_add_constraints(self) -> bool {
        match self {
            Dialect::Sqlite => false,
            Dialect::Postgres => true,
        }
    }

    /// Bind parameter for the 1-based position `idx`
    pub fn placeholder(self, idx: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", idx),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
