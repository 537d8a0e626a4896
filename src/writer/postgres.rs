//! PostgreSQL server backend
//!
//! Uses the blocking `postgres` client. The target database is created on
//! first use through the `postgres` maintenance database.

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::{insert_sql, join_key, Backend, ConnectOptions, Dialect, RowValues};
use crate::error::{BoxError, RegistryError, Result};

const MAINTENANCE_DB: &str = "postgres";
const APPLICATION_NAME: &str = "faa-registry-loader";

/// How to authenticate against the server
#[derive(Debug, Clone)]
pub enum ServerAuth {
    /// Rely on the server trusting the current OS user (peer/trust/.pgpass)
    Trusted,
    Password { username: String, password: String },
}

/// Server connection parameters
#[derive(Debug, Clone)]
pub struct ServerParams {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub auth: ServerAuth,
}

impl ServerParams {
    /// Parse `host` or `host:port`
    pub fn new(server: &str, database: impl Into<String>, auth: ServerAuth) -> Self {
        let (host, port) = match server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => (host.to_string(), Some(port)),
                Err(_) => (server.to_string(), None),
            },
            _ => (server.to_string(), None),
        };

        Self {
            host,
            port,
            database: database.into(),
            auth,
        }
    }

    fn user(&self) -> String {
        match &self.auth {
            ServerAuth::Password { username, .. } => username.clone(),
            ServerAuth::Trusted => ["PGUSER", "USER", "USERNAME"]
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .unwrap_or_else(|| "postgres".to_string()),
        }
    }

    fn config(&self, dbname: &str, options: &ConnectOptions) -> Config {
        let mut config = Config::new();
        config
            .host(&self.host)
            .dbname(dbname)
            .user(&self.user())
            .application_name(APPLICATION_NAME)
            .connect_timeout(options.timeout);

        if let Some(limit) = options.statement_timeout {
            config.options(&format!("-c statement_timeout={}", limit.as_millis()));
        }
        if let Some(port) = self.port {
            config.port(port);
        }
        if let ServerAuth::Password { password, .. } = &self.auth {
            config.password(password);
        }

        config
    }

    /// `host[:port]/database`, without credentials
    pub fn target(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}/{}", self.host, port, self.database),
            None => format!("{}/{}", self.host, self.database),
        }
    }
}

/// PostgreSQL server database
pub struct PostgresBackend {
    client: Client,
    target: String,
}

impl PostgresBackend {
    /// Connect to the target database, creating it first when it is missing.
    /// Returns the backend and whether the database already existed.
    pub fn open(params: &ServerParams, options: ConnectOptions) -> Result<(Self, bool)> {
        let target = params.target();
        let connection_error = |message: &str, source: postgres::Error| RegistryError::Connection {
            target: target.clone(),
            message: message.to_string(),
            source: Some(source.into()),
        };

        let existed = match params.config(&params.database, &options).connect(NoTls) {
            Ok(client) => {
                debug!(database = %target, "Connected to existing database");
                return Ok((
                    Self {
                        client,
                        target: target.clone(),
                    },
                    true,
                ));
            }
            Err(e) if e.code() == Some(&SqlState::INVALID_CATALOG_NAME) => {
                if !options.create_if_missing {
                    return Err(connection_error(
                        "database does not exist and creation is disabled",
                        e,
                    ));
                }
                false
            }
            Err(e) => return Err(connection_error("server unreachable or login rejected", e)),
        };

        let mut admin = params
            .config(MAINTENANCE_DB, &options)
            .connect(NoTls)
            .map_err(|e| connection_error("cannot reach maintenance database", e))?;
        create_database(&mut admin, &params.database)
            .map_err(|e| connection_error("failed to create database", e))?;

        let client = params
            .config(&params.database, &options)
            .connect(NoTls)
            .map_err(|e| connection_error("server unreachable or login rejected", e))?;

        Ok((Self { client, target }, existed))
    }
}

fn create_database(admin: &mut Client, database: &str) -> std::result::Result<(), postgres::Error> {
    let present = !admin
        .query("SELECT 1 FROM pg_database WHERE datname = $1", &[&database])?
        .is_empty();

    if !present {
        info!(database, "Creating database");
        admin.batch_execute(&format!(
            "CREATE DATABASE {}",
            Dialect::Postgres.quote_ident(database)
        ))?;
    }
    Ok(())
}

impl Backend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn describe(&self) -> String {
        format!("postgres:{}", self.target)
    }

    fn execute_ddl(&mut self, sql: &str) -> std::result::Result<(), BoxError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn table_columns(&mut self, table: &str) -> std::result::Result<Vec<String>, BoxError> {
        let rows = self.client.query(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
            &[&table],
        )?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(BoxError::from))
            .collect()
    }

    fn foreign_keys(
        &mut self,
        table: &str,
    ) -> std::result::Result<Vec<(String, String)>, BoxError> {
        let rows = self.client.query(
            "SELECT kcu.column_name::text, ccu.table_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_name = tc.constraint_name \
              AND kcu.table_schema = tc.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
               ON ccu.constraint_name = tc.constraint_name \
              AND ccu.table_schema = tc.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' \
               AND tc.table_schema = current_schema() \
               AND tc.table_name = $1",
            &[&table],
        )?;
        rows.iter()
            .map(|row| -> std::result::Result<(String, String), BoxError> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect()
    }

    fn enable_foreign_keys(&mut self) -> std::result::Result<(), BoxError> {
        // Always enforced once declared
        Ok(())
    }

    fn truncate(&mut self, table: &str) -> std::result::Result<u64, BoxError> {
        let sql = format!("DELETE FROM {}", Dialect::Postgres.quote_ident(table));
        Ok(self.client.execute(sql.as_str(), &[])?)
    }

    fn existing_keys(
        &mut self,
        table: &str,
        key_columns: &[&str],
    ) -> std::result::Result<HashSet<String>, BoxError> {
        let dialect = Dialect::Postgres;
        let columns: Vec<String> = key_columns.iter().map(|c| dialect.quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            dialect.quote_ident(table)
        );

        let mut keys = HashSet::new();
        for row in self.client.query(sql.as_str(), &[])? {
            let values = (0..key_columns.len())
                .map(|idx| row.try_get::<_, Option<String>>(idx))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            keys.insert(join_key(values.iter().map(|v| v.as_deref())));
        }

        Ok(keys)
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[RowValues],
    ) -> std::result::Result<(), BoxError> {
        let sql = insert_sql(Dialect::Postgres, table, columns);
        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(&sql)?;

        for row in rows {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            tx.execute(&stmt, &params)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn row_count(&mut self, table: &str) -> std::result::Result<u64, BoxError> {
        let sql = format!("SELECT COUNT(*) FROM {}", Dialect::Postgres.quote_ident(table));
        let count: i64 = self.client.query_one(sql.as_str(), &[])?.try_get(0)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_with_port() {
        let params = ServerParams::new("db.local:5433", "faa", ServerAuth::Trusted);
        assert_eq!(params.host, "db.local");
        assert_eq!(params.port, Some(5433));
        assert_eq!(params.target(), "db.local:5433/faa");
    }

    #[test]
    fn test_server_without_port() {
        let params = ServerParams::new("localhost", "faa", ServerAuth::Trusted);
        assert_eq!(params.host, "localhost");
        assert_eq!(params.port, None);
        assert_eq!(params.target(), "localhost/faa");
    }

    #[test]
    fn test_password_auth_uses_given_username() {
        let params = ServerParams::new(
            "localhost",
            "faa",
            ServerAuth::Password {
                username: "loader".into(),
                password: "p@ss;word".into(),
            },
        );
        assert_eq!(params.user(), "loader");
        let options = ConnectOptions {
            timeout: Duration::from_secs(5),
            ..ConnectOptions::default()
        };
        let config = params.config("faa", &options);
        assert_eq!(config.get_user(), Some("loader"));
        assert_eq!(config.get_dbname(), Some("faa"));
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn test_statement_timeout_is_separate_from_connect_timeout() {
        let params = ServerParams::new("localhost", "faa", ServerAuth::Trusted);

        let unlimited = params.config("faa", &ConnectOptions::default());
        assert_eq!(unlimited.get_options(), None);
        assert_eq!(unlimited.get_connect_timeout(), Some(&Duration::from_secs(30)));

        let limited = ConnectOptions {
            statement_timeout: Some(Duration::from_secs(120)),
            ..ConnectOptions::default()
        };
        let config = params.config("faa", &limited);
        assert_eq!(config.get_options(), Some("-c statement_timeout=120000"));
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(30)));
    }
}
