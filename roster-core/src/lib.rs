// Core library for the Roster backend
// Request snapshot, response variants, the middleware chain, routing and the blocking server

pub mod envelope;
pub mod error;
pub mod form;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod response;
pub mod routing;
pub mod server;
pub mod session;
pub mod status;

// Re-export commonly used types
pub use error::*;
pub use handler::HandlerOutput;
pub use http::*;
pub use middleware::*;
pub use response::HttpResponse;
pub use routing::{PathParams, Route, Router};
pub use server::{Server, ServerConfig};
pub use session::{AuthMiddleware, MemorySessionStore, Session, SessionStore};
pub use status::*;
