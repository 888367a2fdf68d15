//! Session lookup and the authentication gate built on it.
//!
//! The pipeline never reads ambient session state: [`AuthMiddleware`] asks a
//! [`SessionStore`] for the session named by the request's cookie.

use crate::{Error, HttpRequest, HttpResponse, HttpStatus, envelope};
use crate::middleware::{Middleware, Next};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roster_log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Server-side session data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Session data as key-value pairs
    pub data: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), Error> {
        let json_value =
            serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Session storage backend.
pub trait SessionStore: Send + Sync {
    /// Create and persist a new session.
    fn create(&self, ttl: Option<Duration>) -> Result<Session, Error>;

    /// `Ok(None)` when the session is unknown or expired.
    fn get(&self, session_id: &str) -> Result<Option<Session>, Error>;

    fn save(&self, session: &Session) -> Result<(), Error>;

    fn delete(&self, session_id: &str) -> Result<(), Error>;

    fn count(&self) -> Result<usize, Error>;

    /// Drop expired sessions, returning how many were removed.
    fn cleanup_expired(&self) -> Result<usize, Error>;
}

/// In-process session store.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    default_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2 * 60 * 60))
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, ttl: Option<Duration>) -> Result<Session, Error> {
        let session = Session::new(
            uuid::Uuid::new_v4().simple().to_string(),
            ttl.unwrap_or(self.default_ttl),
        );
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .read()
            .get(session_id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), Error> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    fn count(&self) -> Result<usize, Error> {
        Ok(self.sessions.read().len())
    }

    fn cleanup_expired(&self) -> Result<usize, Error> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(before - sessions.len())
    }
}

/// Rejects requests without a live session.
///
/// API-style requests get a 401 error envelope, browser requests a redirect
/// to the login page. Paths in `public_paths` pass through; an entry ending
/// in `/*` matches everything below it.
pub struct AuthMiddleware {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    login_path: String,
    api_prefix: String,
    public_paths: Vec<String>,
}

impl AuthMiddleware {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            cookie_name: "roster_session".to_string(),
            login_path: "/login".to_string(),
            api_prefix: "/api".to_string(),
            public_paths: Vec::new(),
        }
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    pub fn public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    fn is_public(&self, path: &str) -> bool {
        if path == self.login_path {
            return true;
        }
        self.public_paths.iter().any(|p| match p.strip_suffix("/*") {
            Some(prefix) => path == prefix || path.starts_with(&format!("{}/", prefix)),
            None => path == p,
        })
    }

    fn is_api_request(&self, req: &HttpRequest) -> bool {
        let path = req.path();
        let under_prefix = !self.api_prefix.is_empty()
            && (path == self.api_prefix || path.starts_with(&format!("{}/", self.api_prefix)));
        under_prefix || req.wants_json()
    }

    fn reject(&self, req: &HttpRequest) -> HttpResponse {
        if self.is_api_request(req) {
            envelope::error(
                "Authentication required",
                Vec::new(),
                HttpStatus::Unauthorized.code(),
            )
        } else {
            HttpResponse::redirect(self.login_path.as_str())
        }
    }
}

impl Middleware for AuthMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        if self.is_public(req.path()) {
            return next.run(req);
        }

        let Some(session_id) = req.cookie(&self.cookie_name) else {
            debug!(target: "roster::auth", "No session cookie for {}", req.path());
            return Ok(self.reject(req));
        };

        match self.store.get(session_id) {
            Ok(Some(_)) => next.run(req),
            Ok(None) => {
                debug!(target: "roster::auth", "Unknown or expired session for {}", req.path());
                Ok(self.reject(req))
            }
            Err(err) => {
                debug!(target: "roster::auth", "Session lookup failed: {}", err);
                Ok(self.reject(req))
            }
        }
    }
}
