// Middleware system for request/response processing

use crate::{Error, HttpRequest, HttpResponse, envelope};
use roster_log::{debug, error, info, trace};
use std::sync::Arc;
use std::time::Instant;

/// Terminal stage of a pipeline.
pub trait Endpoint: Send + Sync {
    fn call(&self, req: &HttpRequest) -> Result<HttpResponse, Error>;
}

impl<F> Endpoint for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync,
{
    fn call(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        self(req)
    }
}

/// Middleware trait for processing requests before they reach the handler.
///
/// Returning without calling `next` short-circuits the rest of the chain.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error>;
}

/// The remainder of the chain after the current middleware.
///
/// `run` takes `self` by value, so the remainder executes at most once.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    index: usize,
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub fn run(self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        execute_from(self.middlewares, self.index, self.endpoint, req)
    }
}

fn execute_from(
    middlewares: &[Arc<dyn Middleware>],
    index: usize,
    endpoint: &dyn Endpoint,
    req: &HttpRequest,
) -> Result<HttpResponse, Error> {
    match middlewares.get(index) {
        None => {
            trace!(target: "roster::middleware", "Middleware chain complete, calling endpoint");
            endpoint.call(req)
        }
        Some(middleware) => {
            trace!(target: "roster::middleware", "Executing middleware {}", index);
            middleware.handle(
                req,
                Next {
                    middlewares,
                    index: index + 1,
                    endpoint,
                },
            )
        }
    }
}

/// Ordered middleware list, outermost first.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Builder-style [`use_middleware`](Self::use_middleware).
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.use_middleware(middleware);
        self
    }

    pub fn push_arc(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain in front of `endpoint`.
    pub fn apply(&self, req: &HttpRequest, endpoint: &dyn Endpoint) -> Result<HttpResponse, Error> {
        debug!(
            target: "roster::middleware",
            "Executing middleware chain ({} middleware) for {} {}",
            self.middlewares.len(),
            req.method(),
            req.path()
        );
        execute_from(&self.middlewares, 0, endpoint, req)
    }
}

/// A middleware chain bound to its terminal stage.
///
/// Built once at startup and shared across request threads.
pub struct Pipeline {
    chain: MiddlewareChain,
    endpoint: Box<dyn Endpoint>,
}

impl Pipeline {
    pub fn build<E: Endpoint + 'static>(chain: MiddlewareChain, endpoint: E) -> Self {
        Self {
            chain,
            endpoint: Box::new(endpoint),
        }
    }

    pub fn handle(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        self.chain.apply(req, self.endpoint.as_ref())
    }

    pub fn middleware_count(&self) -> usize {
        self.chain.len()
    }
}

// ========== Built-in Middleware ==========

/// Last-resort error handler.
///
/// Converts any `Err` from the rest of the chain into the JSON error
/// envelope. Install it first so it wraps everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoverMiddleware;

impl Middleware for RecoverMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        match next.run(req) {
            Ok(response) => Ok(response),
            Err(err) => {
                if err.is_server_error() {
                    error!(
                        target: "roster::middleware",
                        "Unhandled error on {} {}: {}",
                        req.method(),
                        req.path(),
                        err
                    );
                } else {
                    debug!(
                        target: "roster::middleware",
                        "Request {} {} failed: {}",
                        req.method(),
                        req.path(),
                        err
                    );
                }
                Ok(envelope::from_error(&err))
            }
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) middleware
pub struct CorsMiddleware {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub allow_credentials: bool,
    pub max_age: u32,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS, PATCH".to_string(),
            allow_headers: "Content-Type, Authorization, Accept, X-Requested-With".to_string(),
            allow_credentials: false,
            max_age: 86400,
        }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allow_origin = origin.to_string();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        // Preflight never reaches the router
        if req.method() == "OPTIONS" {
            let mut response = HttpResponse::no_content()
                .with_header("Access-Control-Allow-Origin", self.allow_origin.as_str())
                .with_header("Access-Control-Allow-Methods", self.allow_methods.as_str())
                .with_header("Access-Control-Allow-Headers", self.allow_headers.as_str())
                .with_header("Access-Control-Max-Age", self.max_age.to_string());
            if self.allow_credentials {
                response = response.with_header("Access-Control-Allow-Credentials", "true");
            }
            return Ok(response);
        }

        let mut response = next.run(req)?;
        let headers = response.headers_mut();
        headers.insert("Access-Control-Allow-Origin", self.allow_origin.as_str());
        if self.allow_credentials {
            headers.insert("Access-Control-Allow-Credentials", "true");
        }
        Ok(response)
    }
}

/// Request ID middleware.
///
/// Echoes an inbound `x-request-id` or generates a UUIDv4.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        let request_id = req
            .header("x-request-id")
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut response = next.run(req)?;
        response.headers_mut().insert("x-request-id", request_id);
        Ok(response)
    }
}

/// Body size limit middleware
pub struct BodySizeLimitMiddleware {
    max_size: usize,
}

impl BodySizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Middleware for BodySizeLimitMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        if req.body().len() > self.max_size {
            return Err(Error::PayloadTooLarge(format!(
                "Request body exceeds maximum size of {} bytes",
                self.max_size
            )));
        }

        next.run(req)
    }
}

/// Security headers middleware
pub struct SecurityHeadersMiddleware {
    hsts_enabled: bool,
    nosniff_enabled: bool,
    xss_protection_enabled: bool,
    frame_options: Option<String>,
}

impl SecurityHeadersMiddleware {
    pub fn new() -> Self {
        Self {
            hsts_enabled: false,
            nosniff_enabled: true,
            xss_protection_enabled: true,
            frame_options: Some("SAMEORIGIN".to_string()),
        }
    }

    pub fn with_hsts(mut self, enabled: bool) -> Self {
        self.hsts_enabled = enabled;
        self
    }

    pub fn with_frame_options(mut self, value: &str) -> Self {
        self.frame_options = Some(value.to_string());
        self
    }
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        let mut response = next.run(req)?;
        let headers = response.headers_mut();

        if self.hsts_enabled {
            headers.insert(
                "Strict-Transport-Security",
                "max-age=31536000; includeSubDomains",
            );
        }
        if self.nosniff_enabled {
            headers.insert("X-Content-Type-Options", "nosniff");
        }
        if self.xss_protection_enabled {
            headers.insert("X-XSS-Protection", "1; mode=block");
        }
        if let Some(frame_opts) = &self.frame_options {
            headers.insert("X-Frame-Options", frame_opts.as_str());
        }

        Ok(response)
    }
}

/// HTTP request/response logging middleware.
///
/// Logs method and path on entry and status plus duration on exit.
pub struct LoggingMiddleware {
    /// Log request bodies
    pub log_request_body: bool,
    /// Maximum body size to log (in bytes)
    pub max_body_size: usize,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            log_request_body: false,
            max_body_size: 1024,
        }
    }

    /// Enable request body logging
    pub fn with_request_body(mut self, enable: bool) -> Self {
        self.log_request_body = enable;
        self
    }

    /// Set maximum body size to log
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    fn body_preview(&self, body: &[u8]) -> String {
        if body.len() > self.max_body_size {
            format!(
                "{}... ({} bytes)",
                String::from_utf8_lossy(&body[..self.max_body_size]),
                body.len()
            )
        } else {
            String::from_utf8_lossy(body).into_owned()
        }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, req: &HttpRequest, next: Next<'_>) -> Result<HttpResponse, Error> {
        let start = Instant::now();

        if self.log_request_body && !req.body().is_empty() {
            info!(
                target: "roster::http",
                "HTTP request received: {} {} body={}",
                req.method(),
                req.path(),
                self.body_preview(req.body())
            );
        } else {
            info!(target: "roster::http", "HTTP request received: {} {}", req.method(), req.path());
        }

        let result = next.run(req);
        let duration = start.elapsed();

        match &result {
            Ok(response) => info!(
                target: "roster::http",
                "HTTP response sent: {} {} status={} duration_ms={}",
                req.method(),
                req.path(),
                response.status(),
                duration.as_millis()
            ),
            Err(err) => error!(
                target: "roster::http",
                "HTTP request failed: {} {} duration_ms={} error={}",
                req.method(),
                req.path(),
                duration.as_millis(),
                err
            ),
        }

        result
    }
}
