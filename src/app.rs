//! Route table and middleware stack of the Roster server.

use crate::controllers::{
    InfluencerController, LogController, LogKind, UserController, UserListKind, audit, db_error,
};
use roster_config::Settings;
use roster_core::{
    AuthMiddleware, BodySizeLimitMiddleware, CorsMiddleware, Error, HttpRequest, HttpResponse,
    LoggingMiddleware, MiddlewareChain, PathParams, Pipeline, RecoverMiddleware,
    RequestIdMiddleware, Router, SecurityHeadersMiddleware, ServerConfig, SessionStore, envelope,
};
use roster_db::{Condition, Database, DbConfig};
use roster_log::{Logger, info};
use serde_json::json;
use std::sync::Arc;

const LOGIN_PAGE: &str = "<!doctype html>\
<title>Roster - Sign in</title>\
<form method=\"post\" action=\"/login\">\
<input name=\"username\" placeholder=\"Username\" autofocus>\
<button type=\"submit\">Sign in</button>\
</form>";

/// Everything a handler needs to build its controller.
pub struct AppState {
    db_config: DbConfig,
    logger: Logger,
    sessions: Arc<dyn SessionStore>,
    cookie_name: String,
    login_path: String,
}

impl AppState {
    pub fn new(settings: &Settings, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            db_config: db_config(settings),
            logger: Logger::new("roster::app"),
            sessions,
            cookie_name: settings.session.cookie_name.clone(),
            login_path: settings.session.login_path.clone(),
        }
    }

    /// A fresh connection for the current request.
    pub fn database(&self) -> Result<Database, Error> {
        Database::open(&self.db_config).map_err(db_error)
    }

    fn influencers(&self) -> Result<InfluencerController, Error> {
        Ok(InfluencerController::new(
            self.database()?,
            self.logger.child("influencers"),
        ))
    }

    fn users(&self) -> Result<UserController, Error> {
        Ok(UserController::new(self.database()?, self.logger.child("users")))
    }

    fn logs(&self) -> Result<LogController, Error> {
        Ok(LogController::new(self.database()?, self.logger.child("logs")))
    }
}

pub fn db_config(settings: &Settings) -> DbConfig {
    DbConfig::new(settings.database.path.clone())
        .busy_timeout_ms(settings.database.busy_timeout_ms)
}

pub fn server_config(settings: &Settings) -> ServerConfig {
    ServerConfig {
        max_header_bytes: settings.server.max_header_bytes,
        max_body_bytes: settings.server.max_body_bytes,
        ..ServerConfig::default()
    }
}

/// Root-to-leaf: Recover, RequestId, Logging, SecurityHeaders, Cors,
/// BodySizeLimit, Auth, then the router.
pub fn build_pipeline(settings: &Settings, sessions: Arc<dyn SessionStore>) -> Pipeline {
    let state = Arc::new(AppState::new(settings, Arc::clone(&sessions)));

    let mut chain = MiddlewareChain::new()
        .with(RecoverMiddleware)
        .with(RequestIdMiddleware)
        .with(LoggingMiddleware::new())
        .with(SecurityHeadersMiddleware::new());
    if settings.cors.enabled {
        chain.use_middleware(CorsMiddleware::new().allow_origin(&settings.cors.allow_origin));
    }
    chain.use_middleware(BodySizeLimitMiddleware::new(settings.server.max_body_bytes));
    chain.use_middleware(
        AuthMiddleware::new(sessions)
            .cookie_name(settings.session.cookie_name.as_str())
            .login_path(settings.session.login_path.as_str())
            .api_prefix(settings.session.api_prefix.as_str())
            .public_paths(settings.session.public_paths.iter().cloned()),
    );

    let router = router(state);
    info!(target: "roster::app", "Pipeline ready with {} routes", router.routes.len());
    Pipeline::build(chain, router)
}

/// Bind a handler to the shared application state.
fn with_state<F>(
    state: &Arc<AppState>,
    f: F,
) -> impl Fn(&HttpRequest, &PathParams) -> Result<HttpResponse, Error> + Send + Sync + 'static
where
    F: Fn(&AppState, &HttpRequest, &PathParams) -> Result<HttpResponse, Error>
        + Send
        + Sync
        + 'static,
{
    let state = Arc::clone(state);
    move |req, params| f(&state, req, params)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .get("/", |_req, _params| {
            Ok(envelope::success(
                json!({ "service": "roster", "version": env!("CARGO_PKG_VERSION") }),
                None,
            ))
        })
        .get("/health", |_req, _params| Ok(json!({ "status": "ok" })))
        .get("/login", |_req, _params| Ok(HttpResponse::raw(LOGIN_PAGE)))
        .post("/login", with_state(&state, |st, req, _| login(st, req)))
        .post("/logout", with_state(&state, |st, req, _| logout(st, req)))
        .get(
            "/api/influencers",
            with_state(&state, |st, req, _| st.influencers()?.index(req)),
        )
        .post(
            "/api/influencers",
            with_state(&state, |st, req, _| st.influencers()?.store(req)),
        )
        .get(
            "/api/influencers/{id}",
            with_state(&state, |st, _req, p| {
                st.influencers()?.show(p.get_parsed("id")?)
            }),
        )
        .put(
            "/api/influencers/{id}",
            with_state(&state, |st, req, p| {
                st.influencers()?.update(req, p.get_parsed("id")?)
            }),
        )
        .patch(
            "/api/influencers/{id}",
            with_state(&state, |st, req, p| {
                st.influencers()?.update(req, p.get_parsed("id")?)
            }),
        )
        .delete(
            "/api/influencers/{id}",
            with_state(&state, |st, _req, p| {
                st.influencers()?.destroy(p.get_parsed("id")?)
            }),
        )
        .get(
            "/api/users",
            with_state(&state, |st, req, _| {
                let raw = req.query("kind").unwrap_or("all");
                let kind = UserListKind::from_str(raw)
                    .ok_or_else(|| Error::BadRequest(format!("unknown user list '{}'", raw)))?;
                st.users()?.index(kind)
            }),
        )
        .get(
            "/api/users/{id}",
            with_state(&state, |st, _req, p| st.users()?.show(p.get_parsed("id")?)),
        )
        .get(
            "/api/logs/{kind}",
            with_state(&state, |st, req, p| {
                let raw = p.get("kind").unwrap_or_default();
                let kind = LogKind::from_str(raw)
                    .ok_or_else(|| Error::NotFound(format!("unknown log type '{}'", raw)))?;
                st.logs()?.index(req, kind)
            }),
        )
}

/// Open a session for an active user.
///
/// Credentials are out of scope here; the user only has to exist and be
/// active.
fn login(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, Error> {
    let username = req.input("username").map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(Error::validation(
            "Validation failed",
            vec!["username is required".to_string()],
        ));
    }

    let mut db = state.database()?;
    let user = db
        .select_one(
            "users",
            &[Condition::eq("username", username), Condition::eq("active", 1)],
        )
        .map_err(db_error)?;

    let Some(user) = user else {
        state.logger.warn(&format!("Rejected login for '{}'", username));
        return if req.wants_json() {
            Ok(envelope::error("Invalid credentials", Vec::new(), 401))
        } else {
            Ok(HttpResponse::see_other(format!("{}?error=1", state.login_path)))
        };
    };

    let user_id = user.get_i64("id");
    let mut session = state.sessions.create(None)?;
    session.set("user_id", user_id)?;
    session.set("username", username)?;
    state.sessions.save(&session)?;
    audit(&mut db, LogKind::User, user_id, "login", "Signed in").map_err(db_error)?;
    state.logger.info(&format!("User '{}' signed in", username));

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        state.cookie_name, session.id
    );
    let response = if req.wants_json() {
        envelope::success(user.into_json(), Some("Signed in"))
    } else {
        HttpResponse::see_other("/")
    };
    Ok(response.with_header("Set-Cookie", cookie))
}

fn logout(state: &AppState, req: &HttpRequest) -> Result<HttpResponse, Error> {
    if let Some(id) = req.cookie(&state.cookie_name) {
        state.sessions.delete(id)?;
    }
    let cookie = format!("{}=; Path=/; Max-Age=0; HttpOnly", state.cookie_name);
    Ok(HttpResponse::see_other(state.login_path.as_str()).with_header("Set-Cookie", cookie))
}
