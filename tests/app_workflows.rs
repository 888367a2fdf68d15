//! End-to-end workflows through the full application pipeline

use roster::app;
use roster::prelude::*;
use roster::schema;
use roster_core::{MemorySessionStore, Server, SessionStore};
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// A SQLite file shared by the per-request connections of one test.
struct TestDb(PathBuf);

impl TestDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "roster-app-{}-{}.sqlite",
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_file(&path);
        TestDb(path)
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

struct TestApp {
    pipeline: Pipeline,
    settings: Settings,
    _db: TestDb,
}

impl TestApp {
    fn new() -> Self {
        let db_file = TestDb::new();
        let mut settings = Settings::default();
        settings.database.path = db_file.0.to_string_lossy().into_owned();

        let mut db = Database::open(&app::db_config(&settings)).unwrap();
        schema::bootstrap(&mut db).unwrap();
        db.insert(
            "users",
            &Values::new().set("username", "admin").set("role", "admin"),
        )
        .unwrap();
        db.insert(
            "users",
            &Values::new().set("username", "retired").set("active", 0),
        )
        .unwrap();

        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let pipeline = app::build_pipeline(&settings, sessions);
        TestApp {
            pipeline,
            settings,
            _db: db_file,
        }
    }

    fn send(&self, req: HttpRequest) -> HttpResponse {
        self.pipeline.handle(&req).unwrap()
    }

    /// Log in as `admin` and return the `Cookie` header value.
    fn login(&self) -> String {
        let resp = self.send(
            HttpRequest::builder("POST", "/login")
                .form(&[("username", "admin")])
                .build(),
        );
        assert_eq!(resp.status(), 303);
        let set_cookie = resp.header("Set-Cookie").unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

fn payload(resp: HttpResponse) -> Value {
    match resp {
        HttpResponse::Json { payload, .. } => payload,
        other => panic!("expected json, got {:?}", other),
    }
}

fn location(resp: HttpResponse) -> Option<String> {
    let (_, headers, _) = resp.into_parts();
    headers.get("Location").map(str::to_string)
}

#[test]
fn test_public_paths_need_no_session() {
    let app = TestApp::new();

    let health = app.send(HttpRequest::new("GET", "/health"));
    assert_eq!(health.status(), 200);
    assert_eq!(payload(health), json!({ "status": "ok" }));

    let login_page = app.send(HttpRequest::new("GET", "/login"));
    assert_eq!(login_page.status(), 200);
    assert!(!login_page.is_json());
}

#[test]
fn test_unauthenticated_requests() {
    let app = TestApp::new();

    let api = app.send(HttpRequest::new("GET", "/api/influencers"));
    assert_eq!(api.status(), 401);
    let body = payload(api);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Authentication required");

    let browser = app.send(HttpRequest::new("GET", "/"));
    assert_eq!(browser.status(), 302);
    assert_eq!(location(browser).as_deref(), Some("/login"));

    let ajax = app.send(
        HttpRequest::builder("GET", "/")
            .header("X-Requested-With", "XMLHttpRequest")
            .build(),
    );
    assert_eq!(ajax.status(), 401);
}

#[test]
fn test_login_rules() {
    let app = TestApp::new();

    let inactive = app.send(
        HttpRequest::builder("POST", "/login")
            .header("Accept", "application/json")
            .form(&[("username", "retired")])
            .build(),
    );
    assert_eq!(inactive.status(), 401);

    let unknown = app.send(
        HttpRequest::builder("POST", "/login")
            .form(&[("username", "nobody")])
            .build(),
    );
    assert_eq!(location(unknown).as_deref(), Some("/login?error=1"));

    let missing = app.send(
        HttpRequest::builder("POST", "/login")
            .form(&[("username", " ")])
            .build(),
    );
    assert_eq!(missing.status(), 422);

    let cookie = app.login();
    assert!(cookie.starts_with(&format!("{}=", app.settings.session.cookie_name)));
}

#[test]
fn test_influencer_crud_workflow() {
    let app = TestApp::new();
    let cookie = app.login();

    let created = app.send(
        HttpRequest::builder("POST", "/api/influencers")
            .header("Cookie", cookie.as_str())
            .json(&json!({ "name": "Ada", "platform": "youtube", "followers": 1500 }))
            .build(),
    );
    assert_eq!(created.status(), 201);
    let id = payload(created)["data"]["id"].as_i64().unwrap();

    let updated = app.send(
        HttpRequest::builder("PATCH", &format!("/api/influencers/{}", id))
            .header("Cookie", cookie.as_str())
            .form(&[("followers", "2000")])
            .build(),
    );
    assert_eq!(updated.status(), 200);
    assert_eq!(payload(updated)["data"]["followers"], 2000);

    let list = app.send(
        HttpRequest::builder("GET", "/api/influencers?search=ada")
            .header("Cookie", cookie.as_str())
            .build(),
    );
    let list = payload(list);
    assert_eq!(list["total"], 1);
    assert_eq!(list["last_page"], 1);

    let deleted = app.send(
        HttpRequest::builder("DELETE", &format!("/api/influencers/{}", id))
            .header("Cookie", cookie.as_str())
            .build(),
    );
    assert_eq!(deleted.status(), 200);

    let logs = payload(app.send(
        HttpRequest::builder("GET", &format!("/api/logs/influencer?subject_id={}", id))
            .header("Cookie", cookie.as_str())
            .build(),
    ));
    assert_eq!(logs["total"], 3);
    assert_eq!(logs["data"][0]["action"], "delete");

    let user_logs = payload(app.send(
        HttpRequest::builder("GET", "/api/logs/user")
            .header("Cookie", cookie.as_str())
            .build(),
    ));
    assert_eq!(user_logs["data"][0]["action"], "login");
    assert_eq!(user_logs["data"][0]["subject_name"], "admin");
}

#[test]
fn test_errors_become_envelopes() {
    let app = TestApp::new();
    let cookie = app.login();
    let get = |target: &str| {
        app.send(
            HttpRequest::builder("GET", target)
                .header("Cookie", cookie.as_str())
                .build(),
        )
    };

    let missing = get("/api/influencers/404");
    assert_eq!(missing.status(), 404);
    assert_eq!(payload(missing)["code"], 404);

    assert_eq!(get("/api/influencers/abc").status(), 400);
    assert_eq!(get("/api/logs/billing").status(), 404);
    assert_eq!(get("/api/users?kind=deleted").status(), 400);
    assert_eq!(get("/api/nowhere").status(), 404);

    let invalid = app.send(
        HttpRequest::builder("POST", "/api/influencers")
            .header("Cookie", cookie.as_str())
            .form(&[("name", "Bad"), ("email", "nope")])
            .build(),
    );
    assert_eq!(invalid.status(), 422);
    assert_eq!(
        payload(invalid)["errors"],
        json!(["email must be a valid address"])
    );
}

#[test]
fn test_method_mismatch_is_405() {
    let app = TestApp::new();
    let cookie = app.login();

    let resp = app.send(
        HttpRequest::builder("DELETE", "/api/influencers")
            .header("Cookie", cookie.as_str())
            .build(),
    );
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.header("Allow"), Some("GET, POST"));
}

#[test]
fn test_users_listing() {
    let app = TestApp::new();
    let cookie = app.login();

    let active = payload(app.send(
        HttpRequest::builder("GET", "/api/users?kind=active")
            .header("Cookie", cookie.as_str())
            .build(),
    ));
    assert_eq!(active["data"].as_array().unwrap().len(), 1);

    let all = payload(app.send(
        HttpRequest::builder("GET", "/api/users")
            .header("Cookie", cookie.as_str())
            .build(),
    ));
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cross_cutting_headers_and_preflight() {
    let app = TestApp::new();

    let preflight = app.send(HttpRequest::new("OPTIONS", "/api/influencers"));
    assert_eq!(preflight.status(), 204);
    assert!(preflight.headers().contains("Access-Control-Allow-Methods"));

    let resp = app.send(
        HttpRequest::builder("GET", "/health")
            .header("X-Request-Id", "req-123")
            .build(),
    );
    assert_eq!(resp.header("X-Request-Id"), Some("req-123"));
    assert_eq!(resp.header("X-Content-Type-Options"), Some("nosniff"));
    assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
}

#[test]
fn test_logout_ends_session() {
    let app = TestApp::new();
    let cookie = app.login();

    let resp = app.send(
        HttpRequest::builder("POST", "/logout")
            .header("Cookie", cookie.as_str())
            .build(),
    );
    assert_eq!(resp.status(), 303);
    assert_eq!(location(resp).as_deref(), Some("/login"));

    let after = app.send(
        HttpRequest::builder("GET", "/api/influencers")
            .header("Cookie", cookie.as_str())
            .build(),
    );
    assert_eq!(after.status(), 401);
}

#[test]
fn test_served_over_tcp() {
    let TestApp {
        pipeline,
        settings,
        _db,
    } = TestApp::new();

    let server = Server::bind(
        "127.0.0.1:0",
        Arc::new(pipeline),
        app::server_config(&settings),
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    std::thread::spawn(move || server.serve());

    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Connection: close\r\n"));
    assert!(out.ends_with("{\"status\":\"ok\"}"));
}
