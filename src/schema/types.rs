use std::collections::HashSet;

/// Canonical column type, translated per backend by `writer::dialect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text of unbounded length
    Text,
    /// Text used as a key or indexed lookup column
    KeyText,
    /// Auto-incrementing surrogate primary key
    Serial,
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    /// Rows with an empty value in a required column are malformed
    pub required: bool,
}

impl Column {
    /// Create an optional text column
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            col_type: ColumnType::Text,
            required: false,
        }
    }

    /// Create a required key column
    pub const fn key(name: &'static str) -> Self {
        Self {
            name,
            col_type: ColumnType::KeyText,
            required: true,
        }
    }

    /// Create an optional column that is indexed or referenced
    pub const fn lookup(name: &'static str) -> Self {
        Self {
            name,
            col_type: ColumnType::KeyText,
            required: false,
        }
    }
}

/// How a table identifies its rows
#[derive(Debug, Clone, Copy)]
pub enum TableKey {
    /// A unique column from the source file is the primary key
    Natural(&'static str),
    /// The source has no unique column; a surrogate serial column is the
    /// primary key and duplicates are detected on the whole row
    Surrogate(&'static str),
}

/// Whether a reference is backed by a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Becomes a FOREIGN KEY when enforcement is enabled
    Hard,
    /// Only ever indexed
    Informational,
}

/// Foreign key reference
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
    pub reference: Reference,
}

impl ForeignKey {
    pub const fn hard(
        column: &'static str,
        references_table: &'static str,
        references_column: &'static str,
    ) -> Self {
        Self {
            column,
            references_table,
            references_column,
            reference: Reference::Hard,
        }
    }

    pub const fn informational(
        column: &'static str,
        references_table: &'static str,
        references_column: &'static str,
    ) -> Self {
        Self {
            column,
            references_table,
            references_column,
            reference: Reference::Informational,
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    /// Member name inside the registry archive
    pub source_file: &'static str,
    /// Data columns in source file order
    pub columns: &'static [Column],
    pub key: TableKey,
    pub foreign_keys: &'static [ForeignKey],
    /// Whether the first line of the source file is a header
    pub has_header: bool,
}

impl TableSchema {
    /// Tables this one must load after (hard FK parents)
    pub fn dependencies(&self) -> HashSet<&'static str> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.reference == Reference::Hard)
            .map(|fk| fk.references_table)
            .collect()
    }

    /// Column names compared when detecting duplicate rows
    pub fn dedup_columns(&self) -> Vec<&'static str> {
        match self.key {
            TableKey::Natural(column) => vec![column],
            TableKey::Surrogate(_) => self.column_names(),
        }
    }

    /// Positions of the dedup columns within a parsed row
    pub fn dedup_positions(&self) -> Vec<usize> {
        match self.key {
            TableKey::Natural(column) => self
                .columns
                .iter()
                .position(|c| c.name == column)
                .into_iter()
                .collect(),
            TableKey::Surrogate(_) => (0..self.columns.len()).collect(),
        }
    }

    /// Data column names in source order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// All column names as stored, surrogate key first
    pub fn stored_column_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(self.columns.len() + 1);
        if let TableKey::Surrogate(id) = self.key {
            names.push(id);
        }
        names.extend(self.column_names());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static WITH_SURROGATE: TableSchema = TableSchema {
        name: "events",
        source_file: "EVENTS.txt",
        columns: &[Column::lookup("n_number"), Column::text("note")],
        key: TableKey::Surrogate("id"),
        foreign_keys: &[ForeignKey::informational("n_number", "master", "n_number")],
        has_header: true,
    };

    #[test]
    fn test_surrogate_dedup_uses_whole_row() {
        assert_eq!(WITH_SURROGATE.dedup_columns(), vec!["n_number", "note"]);
        assert_eq!(WITH_SURROGATE.dedup_positions(), vec![0, 1]);
        assert_eq!(
            WITH_SURROGATE.stored_column_names(),
            vec!["id", "n_number", "note"]
        );
    }

    #[test]
    fn test_informational_reference_is_not_a_dependency() {
        assert!(WITH_SURROGATE.dependencies().is_empty());
    }
}
