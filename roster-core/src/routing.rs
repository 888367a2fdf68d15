// Routing system for HTTP requests

use crate::form;
use crate::handler::HandlerOutput;
use crate::middleware::Endpoint;
use crate::{Error, HttpMethod, HttpRequest, HttpResponse, HttpStatus};
use roster_log::{debug, trace};
use std::str::FromStr;
use std::sync::Arc;

/// A boxed route handler. Receives the request and the extracted path
/// parameters and returns anything that normalizes into a response.
pub type HandlerFn =
    Arc<dyn Fn(&HttpRequest, &PathParams) -> Result<HandlerOutput, Error> + Send + Sync>;

/// Path parameters in the order they are declared in the route pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a parameter, mapping a missing or malformed value to `BadRequest`.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Result<T, Error> {
        let raw = self
            .get(name)
            .ok_or_else(|| Error::BadRequest(format!("Missing path parameter '{}'", name)))?;
        raw.parse::<T>()
            .map_err(|_| Error::BadRequest(format!("Invalid path parameter '{}': {}", name, raw)))
    }

    /// Positional access, zero-based.
    pub fn nth(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    segments: Vec<Segment>,
    pub handler: HandlerFn,
}

impl Route {
    pub fn new(method: HttpMethod, path: impl Into<String>, handler: HandlerFn) -> Self {
        let path = path.into();
        let segments = parse_pattern(&path);
        Self {
            method,
            path,
            segments,
            handler,
        }
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        match_segments(&self.segments, path)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}

/// Router for managing routes and dispatching requests.
///
/// Built once at startup; dispatch only reads the table.
#[derive(Default)]
pub struct Router {
    pub routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route to the router
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Register a handler for `method` and `pattern`.
    ///
    /// Patterns use `{name}` or `:name` for parameters.
    pub fn route<F, R>(mut self, method: HttpMethod, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        let handler: HandlerFn = Arc::new(move |req, params| handler(req, params).map(Into::into));
        self.add_route(Route::new(method, pattern, handler));
        self
    }

    pub fn get<F, R>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        self.route(HttpMethod::GET, pattern, handler)
    }

    pub fn post<F, R>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        self.route(HttpMethod::POST, pattern, handler)
    }

    pub fn put<F, R>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        self.route(HttpMethod::PUT, pattern, handler)
    }

    pub fn patch<F, R>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        self.route(HttpMethod::PATCH, pattern, handler)
    }

    pub fn delete<F, R>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest, &PathParams) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<HandlerOutput>,
    {
        self.route(HttpMethod::DELETE, pattern, handler)
    }

    /// Resolve and invoke the handler for `request`.
    ///
    /// Unknown paths answer 404 and known paths with the wrong method answer
    /// 405 with an `Allow` header; in both cases no handler runs. HEAD falls
    /// back to the GET route when no HEAD route matches.
    pub fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let path = request.raw_path();
        let method = request.http_method();
        let mut allowed: Vec<&'static str> = Vec::new();
        let mut head_fallback: Option<(&Route, PathParams)> = None;

        for route in &self.routes {
            let Some(params) = route.matches(path) else {
                continue;
            };

            if Some(route.method) == method {
                return Self::invoke(route, request, params);
            }

            if method == Some(HttpMethod::HEAD)
                && route.method == HttpMethod::GET
                && head_fallback.is_none()
            {
                head_fallback = Some((route, params));
            }
            if !allowed.contains(&route.method.as_str()) {
                allowed.push(route.method.as_str());
            }
        }

        if let Some((route, params)) = head_fallback {
            return Self::invoke(route, request, params);
        }

        if allowed.is_empty() {
            debug!(target: "roster::routing", "No route for {} {}", request.method(), path);
            Ok(HttpResponse::not_found())
        } else {
            debug!(
                target: "roster::routing",
                "Method {} not allowed for {} (allowed: {})",
                request.method(),
                path,
                allowed.join(", ")
            );
            Ok(HttpResponse::empty(HttpStatus::MethodNotAllowed.code())
                .with_body("Method Not Allowed")
                .with_header("Allow", allowed.join(", ")))
        }
    }
}

impl Router {
    fn invoke(route: &Route, request: &HttpRequest, params: PathParams) -> Result<HttpResponse, Error> {
        debug!(
            target: "roster::routing",
            "Matched {} {} -> {} ({} params)",
            request.method(),
            request.path(),
            route.path,
            params.len()
        );
        let output = (route.handler)(request, &params)?;
        Ok(output.into_response())
    }
}

impl Endpoint for Router {
    fn call(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        trace!(target: "roster::routing", "Dispatching {} {}", req.method(), req.path());
        self.dispatch(req)
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|part| {
            if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else {
                Segment::Static(part.to_string())
            }
        })
        .collect()
}

/// Match parsed pattern segments against a raw request path.
/// Each segment is percent-decoded after splitting.
fn match_segments(segments: &[Segment], path: &str) -> Option<PathParams> {
    let path_parts: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(form::decode_segment)
        .collect();

    if segments.len() != path_parts.len() {
        return None;
    }

    let mut params = PathParams::new();

    for (segment, path_part) in segments.iter().zip(path_parts.iter()) {
        match segment {
            Segment::Param(name) => params.entries.push((name.clone(), path_part.clone())),
            Segment::Static(expected) if expected != path_part => return None,
            Segment::Static(_) => {}
        }
    }

    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_path(pattern: &str, path: &str) -> Option<PathParams> {
        match_segments(&parse_pattern(pattern), path)
    }

    #[test]
    fn test_match_path_static() {
        let result = match_path("/users", "/users");
        assert_eq!(result.map(|p| p.len()), Some(0));
    }

    #[test]
    fn test_match_path_brace_param() {
        let params = match_path("/widgets/{id}", "/widgets/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn test_match_path_colon_param() {
        let params = match_path("/users/:id", "/users/abc-123").unwrap();
        assert_eq!(params.get("id"), Some("abc-123"));
    }

    #[test]
    fn test_match_path_no_match() {
        assert!(match_path("/users/:id", "/posts/123").is_none());
        assert!(match_path("/users/:id", "/users").is_none());
    }

    #[test]
    fn test_params_in_declaration_order() {
        let params = match_path("/users/{user_id}/posts/{post_id}", "/users/7/posts/9").unwrap();
        assert_eq!(params.nth(0), Some("7"));
        assert_eq!(params.nth(1), Some("9"));
        assert_eq!(
            params.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["user_id", "post_id"]
        );
    }

    #[test]
    fn test_match_path_trailing_slash() {
        assert!(match_path("/users", "/users/").is_some());
        assert!(match_path("/", "/").is_some());
    }

    #[test]
    fn test_get_parsed() {
        let params = match_path("/influencers/{id}", "/influencers/17").unwrap();
        assert_eq!(params.get_parsed::<i64>("id").unwrap(), 17);

        let params = match_path("/influencers/{id}", "/influencers/abc").unwrap();
        assert!(matches!(
            params.get_parsed::<i64>("id"),
            Err(Error::BadRequest(_))
        ));
        assert!(params.get_parsed::<i64>("missing").is_err());
    }

    #[test]
    fn test_route_param_names() {
        let route = Route::new(
            HttpMethod::GET,
            "/logs/{kind}/:page",
            Arc::new(|_, _| Ok(HandlerOutput::Empty)),
        );
        assert_eq!(route.param_names(), vec!["kind", "page"]);
    }

    #[test]
    fn test_router_multiple_routes() {
        let mut router = Router::new();
        for i in 0..5 {
            router = router.get(&format!("/test{}", i), |_req, _params| Ok("ok"));
        }
        assert_eq!(router.routes.len(), 5);
    }

    #[test]
    fn test_dispatch_collects_allow_header() {
        let router = Router::new()
            .get("/items/{id}", |_req, _p| Ok("get"))
            .put("/items/{id}", |_req, _p| Ok("put"))
            .delete("/items/{id}", |_req, _p| Ok("delete"));

        let resp = router.dispatch(&HttpRequest::new("POST", "/items/1")).unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.header("Allow"), Some("GET, PUT, DELETE"));
    }

    #[test]
    fn test_encoded_slash_stays_in_one_segment() {
        let params = match_path("/influencers/{id}", "/influencers/a%2Fb").unwrap();
        assert_eq!(params.get("id"), Some("a/b"));
        assert!(match_path("/files/{name}", "/files/a/b").is_none());
        assert!(match_path("/hello world", "/hello%20world").is_some());

        let router = Router::new().get("/tags/{tag}", |_req, p| {
            Ok(p.get("tag").unwrap_or_default().to_string())
        });
        let req = HttpRequest::new("GET", "/tags/rust%2Fweb");
        assert_eq!(req.path(), "/tags/rust/web");
        assert_eq!(router.dispatch(&req).unwrap(), HttpResponse::raw("rust/web"));
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let router = Router::new()
            .post("/items", |_req, _p| Ok("post"))
            .get("/items", |_req, _p| Ok("get"));
        let resp = router.dispatch(&HttpRequest::new("HEAD", "/items")).unwrap();
        assert_eq!(resp, HttpResponse::raw("get"));

        let post_only = Router::new().post("/forms", |_req, _p| Ok("post"));
        let resp = post_only.dispatch(&HttpRequest::new("HEAD", "/forms")).unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.header("Allow"), Some("POST"));
    }

    #[test]
    fn test_explicit_head_route_wins() {
        let router = Router::new()
            .get("/ping", |_req, _p| Ok("get"))
            .route(HttpMethod::HEAD, "/ping", |_req, _p| Ok("head"));
        let resp = router.dispatch(&HttpRequest::new("HEAD", "/ping")).unwrap();
        assert_eq!(resp, HttpResponse::raw("head"));
    }

    #[test]
    fn test_dispatch_handler_error_propagates() {
        let router = Router::new().get("/boom", |_req, _p| -> Result<(), Error> {
            Err(Error::Internal("boom".into()))
        });
        let result = router.dispatch(&HttpRequest::new("GET", "/boom"));
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
