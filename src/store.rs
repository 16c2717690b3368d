use std::fmt;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use tracing::{debug, instrument};

use crate::config::ResolvedConfig;
use crate::error::CredoError;
use crate::query::{AdaptorOptions, Entity, Statement};

/// Handle on the CREDO store.
///
/// Opened once with [`Database::open`] and passed explicitly to every
/// adaptor; [`Database::teardown`] closes the connection.
pub struct Database {
    conn: Connection,
    config: ResolvedConfig,
}

impl Database {
    #[instrument(skip_all, fields(database = %config.database, read_only = config.read_only))]
    pub fn open(config: &ResolvedConfig) -> Result<Self, CredoError> {
        let flags = if config.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(config.database.as_std_path(), flags)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!("opened CREDO store");
        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self, CredoError> {
        Self::open_in_memory_with(ResolvedConfig::for_database(":memory:"))
    }

    pub fn open_in_memory_with(config: ResolvedConfig) -> Result<Self, CredoError> {
        let conn = Connection::open_in_memory()?;
        debug!("opened in-memory CREDO store");
        Ok(Self { conn, config })
    }

    pub fn teardown(self) -> Result<(), CredoError> {
        self.conn.close().map_err(|(_, err)| CredoError::Storage(err))?;
        debug!("closed CREDO store");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn max_depth(&self) -> u32 {
        self.config.max_depth
    }

    /// Adaptor options carrying the configured page size.
    pub fn adaptor_options(&self) -> AdaptorOptions {
        AdaptorOptions {
            per_page: self.config.per_page,
            ..AdaptorOptions::default()
        }
    }

    pub(crate) fn fetch_all<E: Entity>(&self, statement: &Statement) -> Result<Vec<E>, CredoError> {
        self.rows(&statement.sql, &statement.params, E::from_row)
    }

    pub(crate) fn count(&self, statement: &Statement) -> Result<usize, CredoError> {
        debug!(sql = %statement.sql, "count");
        let count: i64 = self.conn.query_row(
            &statement.sql,
            params_from_iter(statement.params.iter()),
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub(crate) fn rows<T, F>(&self, sql: &str, params: &[Value], map: F) -> Result<Vec<T>, CredoError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        debug!(sql = %sql, params = params.len(), "query");
        let mut prepared = self.conn.prepare_cached(sql)?;
        let rows = prepared.query_map(params_from_iter(params.iter()), map)?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("database", &self.config.database)
            .field("read_only", &self.config.read_only)
            .finish()
    }
}
