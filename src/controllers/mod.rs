//! Controllers for influencers, users and audit logs.
//!
//! Each controller is built per request from a database handle and a
//! logger, and exposes one method per endpoint.

mod influencer;
mod log;
mod user;

pub use influencer::InfluencerController;
pub use log::{LogController, LogKind};
pub use user::{UserController, UserListKind};

use roster_core::Error;
use roster_db::{Connection, Database, DbError, DbResult, Row, Values};
use serde_json::Value;

/// Database failures leave the controller as upstream errors.
pub(crate) fn db_error(err: DbError) -> Error {
    Error::upstream(err)
}

pub(crate) fn rows_json(rows: Vec<Row>) -> Vec<Value> {
    rows.into_iter().map(Row::into_json).collect()
}

/// Write one row into the audit log.
pub(crate) fn audit<C: Connection>(
    db: &mut Database<C>,
    kind: LogKind,
    subject_id: Option<i64>,
    action: &str,
    message: &str,
) -> DbResult<i64> {
    db.insert(
        "logs",
        &Values::new()
            .set("kind", kind.as_str())
            .set("subject_id", subject_id)
            .set("action", action)
            .set("message", message),
    )
}
