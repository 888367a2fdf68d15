//! # Roster
//!
//! Admin/API backend for influencer records, users and audit logs.
//!
//! The workspace splits into:
//!
//! - [`roster_core`]: request snapshot, response variants, the middleware
//!   chain, the router and a blocking HTTP/1.1 server
//! - [`roster_db`]: guarded SQL statement builders, transactions and SQLite
//! - [`roster_config`]: layered settings
//! - [`roster_log`]: structured logging
//!
//! This crate wires them into the application: controllers, the schema
//! bootstrap and the pipeline used by the `roster` binary.

// Re-export core functionality
pub use roster_core::*;

pub use roster_config as config;
pub use roster_db as db;
pub use roster_log as log;

pub mod app;
pub mod controllers;
pub mod schema;

// Prelude for common imports
pub mod prelude {
    pub use crate::app::{AppState, build_pipeline};
    pub use crate::controllers::{LogKind, UserListKind};
    pub use crate::{
        Error, HttpMethod, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Next,
        PathParams, Pipeline, Router, envelope,
    };
    pub use roster_config::Settings;
    pub use roster_db::{Condition, Database, DbConfig, QuerySpec, Values};
}
