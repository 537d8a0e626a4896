use tracing::{debug, info};

use super::{Backend, Dialect};
use crate::error::{RegistryError, Result};
use crate::schema::{ColumnType, ForeignKey, Reference, TableKey, TableSchema};

/// Whether hard references become FOREIGN KEY constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyMode {
    /// Declared as constraints and checked by the backend
    Enforced,
    /// Indexed only; load order still respects them
    #[default]
    Advisory,
}

/// Generate CREATE TABLE SQL for a table schema in the given dialect
pub fn generate_create_table(
    schema: &TableSchema,
    dialect: Dialect,
    fk_mode: ForeignKeyMode,
) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", dialect.quote_ident(schema.name));
    let mut columns = Vec::new();

    if let TableKey::Surrogate(id) = schema.key {
        columns.push(format!(
            "    {} {}",
            dialect.quote_ident(id),
            dialect.type_name(ColumnType::Serial)
        ));
    }

    for col in schema.columns {
        let is_pk = matches!(schema.key, TableKey::Natural(key) if key == col.name);
        let pk = if is_pk { " PRIMARY KEY" } else { "" };
        let null_constraint = if col.required { " NOT NULL" } else { "" };

        columns.push(format!(
            "    {} {}{}{}",
            dialect.quote_ident(col.name),
            dialect.type_name(col.col_type),
            pk,
            null_constraint
        ));
    }

    if fk_mode == ForeignKeyMode::Enforced {
        for fk in schema
            .foreign_keys
            .iter()
            .filter(|fk| fk.reference == Reference::Hard)
        {
            columns.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {}({})",
                dialect.quote_ident(fk.column),
                dialect.quote_ident(fk.references_table),
                dialect.quote_ident(fk.references_column)
            ));
        }
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// ALTER TABLE statement adding a hard reference to an existing table, or
/// `None` when the dialect cannot add constraints after creation
pub fn generate_add_foreign_key(
    schema: &TableSchema,
    fk: &ForeignKey,
    dialect: Dialect,
) -> Option<String> {
    if !dialect.can_add_constraints() {
        return None;
    }
    Some(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) NOT VALID",
        dialect.quote_ident(schema.name),
        dialect.quote_ident(&format!("fk_{}_{}", schema.name, fk.column)),
        dialect.quote_ident(fk.column),
        dialect.quote_ident(fk.references_table),
        dialect.quote_ident(fk.references_column)
    ))
}

/// Generate CREATE INDEX statements for every referencing column
pub fn generate_indexes(schema: &TableSchema, dialect: Dialect) -> Vec<String> {
    schema
        .foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                dialect.quote_ident(&format!("idx_{}_{}", schema.name, fk.column)),
                dialect.quote_ident(schema.name),
                dialect.quote_ident(fk.column)
            )
        })
        .collect()
}

/// Create any missing tables and indexes, then check existing tables match
/// their definitions. `tables` must be in dependency order.
pub fn initialize_schema(
    backend: &mut dyn Backend,
    tables: &[&TableSchema],
    fk_mode: ForeignKeyMode,
) -> Result<()> {
    let dialect = backend.dialect();
    info!(tables = tables.len(), dialect = %dialect, "Initializing schema");

    if fk_mode == ForeignKeyMode::Enforced {
        backend
            .enable_foreign_keys()
            .map_err(|e| RegistryError::Schema {
                table: "*".into(),
                message: "cannot enable foreign key enforcement".into(),
                source: Some(e),
            })?;
    }

    for schema in tables {
        let sql = generate_create_table(schema, dialect, fk_mode);
        debug!(table = schema.name, %sql, "Creating table");
        backend.execute_ddl(&sql).map_err(|e| RegistryError::Schema {
            table: schema.name.to_string(),
            message: "CREATE TABLE rejected".into(),
            source: Some(e),
        })?;

        for index_sql in generate_indexes(schema, dialect) {
            backend
                .execute_ddl(&index_sql)
                .map_err(|e| RegistryError::Schema {
                    table: schema.name.to_string(),
                    message: "CREATE INDEX rejected".into(),
                    source: Some(e),
                })?;
        }

        verify_columns(backend, schema)?;
        if fk_mode == ForeignKeyMode::Enforced {
            ensure_foreign_keys(backend, schema, dialect)?;
        }
    }

    Ok(())
}

/// An existing table must carry exactly the expected columns in order
fn verify_columns(backend: &mut dyn Backend, schema: &TableSchema) -> Result<()> {
    let actual = backend
        .table_columns(schema.name)
        .map_err(|e| RegistryError::Schema {
            table: schema.name.to_string(),
            message: "cannot inspect table columns".into(),
            source: Some(e),
        })?;
    let expected = schema.stored_column_names();

    if actual.len() != expected.len()
        || actual
            .iter()
            .zip(&expected)
            .any(|(a, e)| !a.eq_ignore_ascii_case(e))
    {
        return Err(RegistryError::Schema {
            table: schema.name.to_string(),
            message: format!(
                "existing table is incompatible: expected columns [{}], found [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
            source: None,
        });
    }

    Ok(())
}

/// A table created without constraints gets them added, or is rejected
/// when the backend cannot alter it
fn ensure_foreign_keys(
    backend: &mut dyn Backend,
    schema: &TableSchema,
    dialect: Dialect,
) -> Result<()> {
    let declared = backend
        .foreign_keys(schema.name)
        .map_err(|e| RegistryError::Schema {
            table: schema.name.to_string(),
            message: "cannot inspect foreign keys".into(),
            source: Some(e),
        })?;

    for fk in schema
        .foreign_keys
        .iter()
        .filter(|fk| fk.reference == Reference::Hard)
    {
        let present = declared.iter().any(|(column, table)| {
            column.eq_ignore_ascii_case(fk.column)
                && table.eq_ignore_ascii_case(fk.references_table)
        });
        if present {
            continue;
        }

        let Some(sql) = generate_add_foreign_key(schema, fk, dialect) else {
            return Err(RegistryError::Schema {
                table: schema.name.to_string(),
                message: format!(
                    "existing table has no foreign key on {}; recreate it to enforce references",
                    fk.column
                ),
                source: None,
            });
        };
        info!(table = schema.name, column = fk.column, "Adding foreign key");
        backend.execute_ddl(&sql).map_err(|e| RegistryError::Schema {
            table: schema.name.to_string(),
            message: format!("cannot add foreign key on {}", fk.column),
            source: Some(e),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{ACFTREF, DEREG, ENGINE, MASTER};
    use crate::writer::{ConnectOptions, SqliteBackend};
    use std::path::Path;

    #[test]
    fn test_generate_create_table_sqlite() {
        let sql = generate_create_table(&ACFTREF, Dialect::Sqlite, ForeignKeyMode::Advisory);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"acftref\""));
        assert!(sql.contains("\"code\" TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("\"tc_data_holder\" TEXT"));
    }

    #[test]
    fn test_generate_create_table_postgres_surrogate() {
        let sql = generate_create_table(&DEREG, Dialect::Postgres, ForeignKeyMode::Enforced);
        assert!(sql.contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"));
        assert!(sql.contains("\"n_number\" VARCHAR(255)"));
        // Informational references never become constraints
        assert!(!sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_foreign_keys_follow_mode() {
        let enforced = generate_create_table(&MASTER, Dialect::Sqlite, ForeignKeyMode::Enforced);
        assert!(enforced.contains("FOREIGN KEY (\"mfr_mdl_code\") REFERENCES \"acftref\"(\"code\")"));
        assert!(enforced.contains("FOREIGN KEY (\"eng_mfr_mdl\") REFERENCES \"engine\"(\"code\")"));

        let advisory = generate_create_table(&MASTER, Dialect::Sqlite, ForeignKeyMode::Advisory);
        assert!(!advisory.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_add_foreign_key_only_where_supported() {
        let fk = &MASTER.foreign_keys[0];
        assert_eq!(generate_add_foreign_key(&MASTER, fk, Dialect::Sqlite), None);

        let sql = generate_add_foreign_key(&MASTER, fk, Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"master\" ADD CONSTRAINT \"fk_master_mfr_mdl_code\" \
             FOREIGN KEY (\"mfr_mdl_code\") REFERENCES \"acftref\"(\"code\") NOT VALID"
        );
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&MASTER, Dialect::Sqlite);
        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().any(|i| i.contains("\"idx_master_mfr_mdl_code\"")));
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        let tables = [&ACFTREF, &MASTER];

        initialize_schema(&mut backend, &tables, ForeignKeyMode::Enforced).unwrap();
        initialize_schema(&mut backend, &tables, ForeignKeyMode::Enforced).unwrap();
        assert_eq!(backend.row_count("master").unwrap(), 0);
    }

    #[test]
    fn test_enforcing_on_advisory_tables_is_rejected() {
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        let tables = [&ACFTREF, &ENGINE, &MASTER];

        initialize_schema(&mut backend, &tables, ForeignKeyMode::Advisory).unwrap();
        let err = initialize_schema(&mut backend, &tables, ForeignKeyMode::Enforced).unwrap_err();
        match err {
            RegistryError::Schema { table, message, .. } => {
                assert_eq!(table, "master");
                assert!(message.contains("mfr_mdl_code"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_enforced_tables_report_their_foreign_keys() {
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        initialize_schema(&mut backend, &[&ACFTREF, &ENGINE, &MASTER], ForeignKeyMode::Enforced)
            .unwrap();

        let mut keys = backend.foreign_keys("master").unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("eng_mfr_mdl".to_string(), "engine".to_string()),
                ("mfr_mdl_code".to_string(), "acftref".to_string()),
            ]
        );
    }

    #[test]
    fn test_incompatible_existing_table_is_rejected() {
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        backend
            .execute_ddl("CREATE TABLE \"acftref\" (\"code\" TEXT PRIMARY KEY)")
            .unwrap();

        let err = initialize_schema(&mut backend, &[&ACFTREF], ForeignKeyMode::Advisory)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Schema { ref table, .. } if table == "acftref"));
    }
}
