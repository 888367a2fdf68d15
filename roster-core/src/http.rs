// HTTP request snapshot and the header/parameter containers it is built from

use crate::form;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// HTTP methods the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Case-insensitive header map that keeps insertion order and original casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// CGI-style lookup: `HTTP_USER_AGENT` reads `User-Agent`,
    /// `CONTENT_TYPE`/`CONTENT_LENGTH` read the unprefixed headers.
    pub fn server_var(&self, key: &str) -> Option<&str> {
        let name = key.strip_prefix("HTTP_").unwrap_or(key);
        if name.len() == key.len() && key != "CONTENT_TYPE" && key != "CONTENT_LENGTH" {
            return None;
        }
        let header = name.replace('_', "-");
        self.get(&header)
    }

    /// Set `name`, replacing any existing values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Add another value for `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
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

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

// ============================================================================
// Params
// ============================================================================

/// Ordered multimap of decoded request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key` in order (`tag=a&tag=b`).
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
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

    /// Collapse into a single-valued map; the first occurrence wins.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (k, v) in &self.entries {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        map
    }
}

impl From<Vec<(String, String)>> for Params {
    fn from(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// ============================================================================
// Request snapshot
// ============================================================================

/// Immutable snapshot of one inbound request.
///
/// Built once per request by [`HttpRequest::from_parts`] (or the builder in
/// tests) and passed by reference through every middleware and handler.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: String,
    path: String,
    raw_path: String,
    query: Params,
    body_params: Params,
    headers: Headers,
    cookies: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Request with no headers or body.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        Self::from_parts(method, target, Headers::new(), Vec::new())
    }

    pub fn builder(method: impl Into<String>, target: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method: method.into(),
            target: target.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Decode the request target, cookies and body parameters.
    ///
    /// `target` is the raw request-target (`/path?query`); the path is
    /// percent-decoded, the query string is split off and parsed.
    pub fn from_parts(
        method: impl Into<String>,
        target: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> Self {
        let method = method.into().to_uppercase();
        let (raw_path, raw_query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target, ""),
        };

        let path = form::decode_path(raw_path);
        let raw_path = if raw_path.is_empty() { "/" } else { raw_path }.to_string();
        let query = form::parse_query(raw_query);
        let cookies = headers
            .get_all("cookie")
            .flat_map(form::parse_cookie_header)
            .collect();
        let body_params = form::parse_body_params(headers.get("content-type"), &body);

        Self {
            method,
            path,
            raw_path,
            query,
            body_params,
            headers,
            cookies,
            body,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parsed method, `None` for verbs the router does not know.
    pub fn http_method(&self) -> Option<HttpMethod> {
        HttpMethod::from_str(&self.method)
    }

    /// Decoded path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path as sent, before percent-decoding. Routing splits this one
    /// so that `%2F` inside a segment is not a separator.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    pub fn query_params(&self) -> &Params {
        &self.query
    }

    /// Form-encoded or JSON body parameter.
    pub fn body_param(&self, name: &str) -> Option<&str> {
        self.body_params.get(name)
    }

    pub fn body_params(&self) -> &Params {
        &self.body_params
    }

    /// Body parameter first, then query parameter.
    pub fn input(&self, name: &str) -> Option<&str> {
        self.body_param(name).or_else(|| self.query(name))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// CGI-style header lookup (`HTTP_X_REQUESTED_WITH`).
    pub fn server(&self, key: &str) -> Option<&str> {
        self.headers.server_var(key)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parse the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }

    /// Whether the body was sent as JSON.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }

    /// Whether this is an XHR call (`X-Requested-With: XMLHttpRequest`).
    pub fn is_ajax(&self) -> bool {
        self.server("HTTP_X_REQUESTED_WITH")
            .map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
            .unwrap_or(false)
    }

    /// Whether the client asked for a JSON answer.
    pub fn wants_json(&self) -> bool {
        self.is_ajax()
            || self
                .header("accept")
                .map(|a| a.to_ascii_lowercase().contains("application/json"))
                .unwrap_or(false)
    }
}

/// Builder used by tests and by callers that assemble requests by hand.
#[derive(Debug)]
pub struct RequestBuilder {
    method: String,
    target: String,
    headers: Headers,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with the matching content type.
    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.headers.insert("Content-Type", "application/json");
        self.body = value.to_string().into_bytes();
        self
    }

    /// URL-encoded form body with the matching content type.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.headers
            .insert("Content-Type", "application/x-www-form-urlencoded");
        self.body = serde_urlencoded::to_string(fields)
            .unwrap_or_default()
            .into_bytes();
        self
    }

    pub fn build(self) -> HttpRequest {
        HttpRequest::from_parts(self.method, &self.target, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_round_trip() {
        assert_eq!(HttpMethod::from_str("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::PATCH.as_str(), "PATCH");
        assert_eq!(HttpMethod::from_str("BREW"), None);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));

        headers.insert("CONTENT-TYPE", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_server_var_lookup() {
        let headers: Headers = [("User-Agent", "curl/8"), ("Content-Type", "text/html")]
            .into_iter()
            .collect();
        assert_eq!(headers.server_var("HTTP_USER_AGENT"), Some("curl/8"));
        assert_eq!(headers.server_var("CONTENT_TYPE"), Some("text/html"));
        assert_eq!(headers.server_var("USER_AGENT"), None);
    }

    #[test]
    fn test_path_is_decoded_and_query_stripped() {
        let req = HttpRequest::new("get", "/influencers/caf%C3%A9%20bar?page=2&tag=a&tag=b");
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/influencers/café bar");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(
            req.query_params().get_all("tag").collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_form_body_params() {
        let req = HttpRequest::builder("POST", "/influencers")
            .form(&[("name", "Ada Lovelace"), ("platform", "youtube")])
            .build();
        assert_eq!(req.body_param("name"), Some("Ada Lovelace"));
        assert_eq!(req.input("platform"), Some("youtube"));
    }

    #[test]
    fn test_json_body_params() {
        let req = HttpRequest::builder("POST", "/api/influencers?name=ignored")
            .json(&json!({"name": "Grace", "followers": 1200, "active": true, "bio": null}))
            .build();
        assert!(req.is_json());
        assert_eq!(req.body_param("name"), Some("Grace"));
        assert_eq!(req.body_param("followers"), Some("1200"));
        assert_eq!(req.body_param("bio"), Some(""));
        assert_eq!(req.input("name"), Some("Grace"));

        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["followers"], 1200);
    }

    #[test]
    fn test_cookies_parsed() {
        let req = HttpRequest::builder("GET", "/")
            .header("Cookie", "roster_session=abc123; theme=dark")
            .build();
        assert_eq!(req.cookie("roster_session"), Some("abc123"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn test_wants_json() {
        let xhr = HttpRequest::builder("GET", "/")
            .header("X-Requested-With", "XMLHttpRequest")
            .build();
        assert!(xhr.is_ajax());
        assert!(xhr.wants_json());

        let browser = HttpRequest::builder("GET", "/")
            .header("Accept", "text/html")
            .build();
        assert!(!browser.wants_json());
    }

    #[test]
    fn test_params_to_map_first_wins() {
        let params: Params = [("a", "1"), ("a", "2"), ("b", "3")].into_iter().collect();
        let map = params.to_map();
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.len(), 2);
    }
}
