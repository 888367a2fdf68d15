//! The connection seam and its SQLite implementation.

use crate::config::DbConfig;
use crate::value::{Row, SqlValue};
use crate::DbResult;
use rusqlite::OpenFlags;

/// A single database connection.
///
/// Implementations are `Send` so a connection can move to the thread that
/// serves a request, but they are not shared between threads.
pub trait Connection: Send {
    /// Run a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a query and collect every row.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>>;

    /// Run several `;`-separated statements without parameters.
    fn execute_batch(&mut self, sql: &str) -> DbResult<()>;

    /// Row id generated by the most recent successful INSERT.
    fn last_insert_id(&self) -> i64;

    fn begin(&mut self) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// False while the driver has an open transaction.
    fn is_autocommit(&self) -> bool;
}

/// [`Connection`] over `rusqlite`.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open a connection and apply the configured pragmas.
    pub fn open(config: &DbConfig) -> DbResult<Self> {
        config.validate()?;

        let conn = if config.is_memory() {
            rusqlite::Connection::open_in_memory()?
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI;
            if config.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            rusqlite::Connection::open_with_flags(&config.path, flags)?
        };

        conn.busy_timeout(config.busy_timeout())?;
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&DbConfig::in_memory())
    }

    /// Wrap an already configured `rusqlite` connection.
    pub fn from_rusqlite(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.execute(rusqlite::params_from_iter(params.iter()))?)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Row::from_sqlite(row, &names)?);
        }
        Ok(out)
    }

    fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn begin(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("BEGIN")?)
    }

    fn commit(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("ROLLBACK")?)
    }

    fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }
}
