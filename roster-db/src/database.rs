//! The data-access facade handed to services and controllers.

use crate::config::DbConfig;
use crate::connection::{Connection, SqliteConnection};
use crate::pagination::{Paginated, Pagination};
use crate::query::{self, Column, Condition, QuerySpec, SelectOptions, Statement, Values};
use crate::transaction::TransactionCoordinator;
use crate::value::{Row, SqlValue};
use crate::{DbError, DbResult};
use roster_log::{debug, warn};

/// Statement builders plus execution over one owned connection.
///
/// Not shareable across threads: every method takes `&mut self`.
pub struct Database<C: Connection = SqliteConnection> {
    tx: TransactionCoordinator<C>,
}

impl Database<SqliteConnection> {
    /// Open a SQLite database.
    pub fn open(config: &DbConfig) -> DbResult<Self> {
        debug!(target: "roster::db", "Opening database at {}", config.path);
        Ok(Self::new(SqliteConnection::open(config)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&DbConfig::in_memory())
    }
}

impl<C: Connection> Database<C> {
    pub fn new(conn: C) -> Self {
        Self {
            tx: TransactionCoordinator::new(conn),
        }
    }

    fn run_query(&mut self, stmt: &Statement) -> DbResult<Vec<Row>> {
        debug!(target: "roster::db", "SQL: {} ({} params)", stmt.sql, stmt.params.len());
        self.tx.connection_mut().query(&stmt.sql, &stmt.params)
    }

    fn run_execute(&mut self, stmt: &Statement) -> DbResult<usize> {
        debug!(target: "roster::db", "SQL: {} ({} params)", stmt.sql, stmt.params.len());
        self.tx.connection_mut().execute(&stmt.sql, &stmt.params)
    }

    /// Rows of `table` matching every condition.
    pub fn select(
        &mut self,
        table: &str,
        conditions: &[Condition],
        columns: &[Column],
        options: &SelectOptions,
    ) -> DbResult<Vec<Row>> {
        let stmt = query::select(table, conditions, columns, options)?;
        self.run_query(&stmt)
    }

    pub fn select_spec(&mut self, spec: &QuerySpec) -> DbResult<Vec<Row>> {
        let stmt = spec.to_statement()?;
        self.run_query(&stmt)
    }

    /// First matching row, if any.
    pub fn select_one(&mut self, table: &str, conditions: &[Condition]) -> DbResult<Option<Row>> {
        let stmt = query::select(table, conditions, &[], &SelectOptions::new().limit(1))?;
        Ok(self.run_query(&stmt)?.into_iter().next())
    }

    pub fn count(&mut self, table: &str, conditions: &[Condition]) -> DbResult<u64> {
        let stmt = query::count(table, conditions, &SelectOptions::default())?;
        self.count_statement(&stmt)
    }

    /// Row count for a spec, ignoring its ordering and limits.
    pub fn count_spec(&mut self, spec: &QuerySpec) -> DbResult<u64> {
        let stmt = spec.to_count_statement()?;
        self.count_statement(&stmt)
    }

    fn count_statement(&mut self, stmt: &Statement) -> DbResult<u64> {
        let rows = self.run_query(stmt)?;
        let total = rows
            .first()
            .and_then(|row| row.get_i64("total"))
            .ok_or_else(|| DbError::Decode("COUNT query returned no total".into()))?;
        u64::try_from(total).map_err(|_| DbError::Decode(format!("negative count {}", total)))
    }

    /// One page of a spec plus the total number of matching rows.
    pub fn paginate(&mut self, spec: &QuerySpec, pagination: &Pagination) -> DbResult<Paginated<Row>> {
        let total = self.count_spec(spec)?;
        let items = self.select_spec(&spec.clone().paginate(pagination))?;
        Ok(Paginated::new(items, pagination, total))
    }

    /// Insert one row and return its generated id.
    pub fn insert(&mut self, table: &str, values: &Values) -> DbResult<i64> {
        let stmt = query::insert(table, values)?;
        self.run_execute(&stmt)?;
        Ok(self.tx.connection().last_insert_id())
    }

    /// Update matching rows, returning how many changed.
    pub fn update(
        &mut self,
        table: &str,
        values: &Values,
        conditions: &[Condition],
    ) -> DbResult<usize> {
        let stmt = query::update(table, values, conditions)?;
        self.run_execute(&stmt)
    }

    /// Delete matching rows, returning how many were removed.
    pub fn delete(&mut self, table: &str, conditions: &[Condition]) -> DbResult<usize> {
        let stmt = query::delete(table, conditions)?;
        self.run_execute(&stmt)
    }

    /// Run caller-written SQL that returns rows.
    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        debug!(target: "roster::db", "SQL: {} ({} params)", sql, params.len());
        self.tx.connection_mut().query(sql, params)
    }

    /// Run caller-written SQL, returning affected rows.
    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        debug!(target: "roster::db", "SQL: {} ({} params)", sql, params.len());
        self.tx.connection_mut().execute(sql, params)
    }

    pub fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.tx.connection_mut().execute_batch(sql)
    }

    pub fn last_insert_id(&self) -> i64 {
        self.tx.connection().last_insert_id()
    }

    pub fn begin_transaction(&mut self) -> DbResult<()> {
        self.tx.begin()
    }

    pub fn commit(&mut self) -> DbResult<()> {
        self.tx.commit()
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        self.tx.rollback()
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.in_transaction()
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The closure may end the transaction itself with `commit` or
    /// `rollback`; the helper then has nothing left to commit. The closure's
    /// error is returned unchanged even if the rollback itself fails.
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.begin_transaction()?;

        match f(self) {
            Ok(value) if !self.in_transaction() => Ok(value),
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(err) => {
                    if self.in_transaction() {
                        if let Err(rollback_err) = self.rollback() {
                            warn!(target: "roster::db", "Rollback after failed commit failed: {}", rollback_err);
                        }
                    }
                    Err(err.into())
                }
            },
            Err(err) => {
                if self.in_transaction() {
                    if let Err(rollback_err) = self.rollback() {
                        warn!(target: "roster::db", "Rollback failed: {}", rollback_err);
                    }
                }
                Err(err)
            }
        }
    }

    pub fn connection(&self) -> &C {
        self.tx.connection()
    }

    pub fn into_connection(self) -> C {
        self.tx.into_inner()
    }
}
