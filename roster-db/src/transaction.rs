//! Transaction state tracking around a single connection.

use crate::connection::Connection;
use crate::{DbError, DbResult};
use roster_log::debug;

/// Whether a transaction is open on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
}

/// Owns one connection and enforces `Idle -> begin -> Active -> commit|rollback -> Idle`.
///
/// Out-of-order calls fail with [`DbError::NoActiveTransaction`] or
/// [`DbError::TransactionAlreadyActive`] before the driver is touched. There
/// is no automatic rollback; see [`Database::transaction`](crate::Database::transaction)
/// for the closure form.
pub struct TransactionCoordinator<C: Connection> {
    conn: C,
    state: TransactionState,
}

impl<C: Connection> TransactionCoordinator<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            state: TransactionState::Idle,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn begin(&mut self) -> DbResult<()> {
        if self.in_transaction() {
            return Err(DbError::TransactionAlreadyActive);
        }
        self.conn.begin()?;
        self.state = TransactionState::Active;
        debug!(target: "roster::db", "Transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> DbResult<()> {
        if !self.in_transaction() {
            return Err(DbError::NoActiveTransaction);
        }
        let result = self.conn.commit();
        self.sync_state();
        debug!(target: "roster::db", "Transaction commit: {}", outcome(&result));
        result
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction() {
            return Err(DbError::NoActiveTransaction);
        }
        // Some driver errors end the transaction on their own
        if self.conn.is_autocommit() {
            self.state = TransactionState::Idle;
            debug!(target: "roster::db", "Transaction already ended by the driver");
            return Ok(());
        }
        let result = self.conn.rollback();
        self.sync_state();
        debug!(target: "roster::db", "Transaction rollback: {}", outcome(&result));
        result
    }

    /// A failed COMMIT may leave the driver's transaction open (e.g. on a
    /// busy database), so the state follows the driver afterwards.
    fn sync_state(&mut self) {
        self.state = if self.conn.is_autocommit() {
            TransactionState::Idle
        } else {
            TransactionState::Active
        };
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}

fn outcome(result: &DbResult<()>) -> &'static str {
    if result.is_ok() { "ok" } else { "failed" }
}
