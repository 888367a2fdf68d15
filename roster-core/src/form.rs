//! Decoding helpers for request targets, form bodies, JSON bodies and cookies

use crate::Error;
use crate::http::Params;
use serde::de::DeserializeOwned;

/// Parse URL-encoded form data into a typed value.
pub fn parse_form<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::BadRequest(format!("Failed to parse form data: {}", e)))
}

/// Parse URL-encoded pairs, keeping order and duplicates.
pub fn parse_form_pairs(body: &[u8]) -> Result<Params, Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::BadRequest(format!("Failed to parse form data: {}", e)))?;
    Ok(Params::from(pairs))
}

/// Percent-decode a request path. Invalid UTF-8 is replaced, never rejected.
pub fn decode_path(raw: &str) -> String {
    let bytes = urlencoding::decode_binary(raw.as_bytes());
    let path = String::from_utf8_lossy(&bytes).into_owned();
    if path.is_empty() { "/".to_string() } else { path }
}

/// Percent-decode one path segment, so an encoded `/` stays inside it.
pub fn decode_segment(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Parse a query string. A malformed query yields no parameters.
pub fn parse_query(raw: &str) -> Params {
    if raw.is_empty() {
        return Params::new();
    }
    parse_form_pairs(raw.as_bytes()).unwrap_or_default()
}

/// Split a `Cookie:` header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

/// Decode body parameters according to the content type.
///
/// JSON objects are flattened one level: strings keep their value, `null`
/// becomes an empty string and every other value is stored as JSON text.
pub fn parse_body_params(content_type: Option<&str>, body: &[u8]) -> Params {
    if body.is_empty() {
        return Params::new();
    }
    let content_type = content_type.unwrap_or("").to_ascii_lowercase();

    if content_type.contains("application/json") {
        return match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| {
                    let text = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (k, text)
                })
                .collect(),
            _ => Params::new(),
        };
    }

    if content_type.contains("application/x-www-form-urlencoded") {
        return parse_form_pairs(body).unwrap_or_default();
    }

    Params::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Search {
        search: String,
        page: u32,
    }

    #[test]
    fn test_parse_form_typed() {
        let form: Search = parse_form(b"search=ada&page=3").unwrap();
        assert_eq!(form.search, "ada");
        assert_eq!(form.page, 3);
    }

    #[test]
    fn test_parse_form_typed_error() {
        let result: Result<Search, _> = parse_form(b"search=ada&page=three");
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/a%20b"), "/a b");
        assert_eq!(decode_path(""), "/");
        assert_eq!(decode_path("/%FF"), "/\u{FFFD}");
    }

    #[test]
    fn test_cookie_header() {
        let cookies = parse_cookie_header("a=1; b=\"two\";; =skip; c=hello%20world");
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string()),
                ("c".to_string(), "hello world".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_content_type_ignored() {
        assert!(parse_body_params(Some("text/plain"), b"name=x").is_empty());
        assert!(parse_body_params(Some("application/json"), b"[1,2]").is_empty());
    }
}
