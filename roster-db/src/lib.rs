//! # Roster DB
//!
//! Synchronous data access for the Roster backend.
//!
//! - **Statement builders**: `select`/`insert`/`update`/`delete` render SQL
//!   text plus bound parameters; UPDATE and DELETE refuse to render without
//!   a WHERE clause.
//! - **Raw fragments**: [`RawSql`] is the only way to inline SQL text.
//! - **Transactions**: [`TransactionCoordinator`] tracks begin/commit/rollback
//!   and rejects out-of-order calls.
//! - **SQLite**: [`SqliteConnection`] implements the [`Connection`] seam over
//!   `rusqlite`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roster_db::{Condition, Database, DbConfig, Values};
//!
//! # fn main() -> roster_db::DbResult<()> {
//! let mut db = Database::open(&DbConfig::new("roster.sqlite"))?;
//!
//! db.transaction(|db| -> roster_db::DbResult<()> {
//!     let id = db.insert("influencers", &Values::new().set("name", "Ada"))?;
//!     db.update(
//!         "influencers",
//!         &Values::new().set("followers", 1200),
//!         &[Condition::eq("id", id)],
//!     )?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

mod config;
mod connection;
mod database;
mod error;
mod pagination;
pub mod query;
mod transaction;
mod value;

pub use config::*;
pub use connection::*;
pub use database::*;
pub use error::*;
pub use pagination::*;
pub use query::{
    Column, CompareOp, Comparison, Condition, Having, Join, JoinKind, QuerySpec, SelectOptions,
    SortOrder, Statement, Values, validate_identifier,
};
pub use transaction::*;
pub use value::*;
