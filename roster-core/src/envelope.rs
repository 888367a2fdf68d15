//! JSON envelopes shared by every API-style response.
//!
//! ```text
//! success:   { "success": true,  "data": ..., "message"?: ..., "timestamp": "YYYY-MM-DD HH:MM:SS" }
//! error:     { "success": false, "message": ..., "errors": [...], "code": 404, "timestamp": ... }
//! tabulator: { "success": true,  "last_page": n, "data": [...], "total": n, "message"?: ... }
//! ```

use crate::{Error, HttpResponse, HttpStatus};
use serde_json::{Map, Value, json};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time in the envelope format.
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `success: true` envelope with status 200.
pub fn success(data: Value, message: Option<&str>) -> HttpResponse {
    success_with_status(data, message, HttpStatus::Ok.code())
}

pub fn success_with_status(data: Value, message: Option<&str>, status: u16) -> HttpResponse {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("data".into(), data);
    if let Some(message) = message {
        body.insert("message".into(), Value::String(message.to_string()));
    }
    body.insert("timestamp".into(), Value::String(timestamp()));
    HttpResponse::json(Value::Object(body)).with_status(status)
}

/// `success: false` envelope; the HTTP status equals `code`.
pub fn error(message: &str, errors: Vec<String>, code: u16) -> HttpResponse {
    HttpResponse::json(json!({
        "success": false,
        "message": message,
        "errors": errors,
        "code": code,
        "timestamp": timestamp(),
    }))
    .with_status(code)
}

/// Error envelope for a pipeline error.
///
/// Server errors get a generic message so internals do not leak.
pub fn from_error(err: &Error) -> HttpResponse {
    let status = err.http_status();
    let message = if status.is_server_error() {
        status.reason().to_string()
    } else {
        err.to_string()
    };
    error(&message, err.details(), status.code())
}

/// Number of pages for `total` rows at `limit` per page; 0 when `limit` is 0.
pub fn last_page(total: u64, limit: u64) -> u64 {
    if limit == 0 { 0 } else { total.div_ceil(limit) }
}

/// Paginated list envelope in the shape data-grid widgets expect.
pub fn tabulator(data: Vec<Value>, total: u64, limit: u64, message: Option<&str>) -> HttpResponse {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("last_page".into(), json!(last_page(total, limit)));
    body.insert("data".into(), Value::Array(data));
    body.insert("total".into(), json!(total));
    if let Some(message) = message {
        body.insert("message".into(), Value::String(message.to_string()));
    }
    HttpResponse::json(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(resp: &HttpResponse) -> &Value {
        match resp {
            HttpResponse::Json { payload, .. } => payload,
            other => panic!("expected json, got {:?}", other),
        }
    }

    #[test]
    fn test_success_envelope() {
        let resp = success(json!({"id": 1}), Some("Created"));
        let body = payload(&resp);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["message"], "Created");
        assert_eq!(body["timestamp"].as_str().map(str::len), Some(19));
        assert_eq!(resp.status(), 200);
    }

    #[test]
    fn test_success_without_message() {
        let resp = success(json!([]), None);
        assert!(payload(&resp).get("message").is_none());
    }

    #[test]
    fn test_error_envelope() {
        let resp = error("Not found", vec!["id".into()], 404);
        let body = payload(&resp);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 404);
        assert_eq!(body["errors"], json!(["id"]));
        assert_eq!(resp.status(), 404);
    }

    #[test]
    fn test_from_error_hides_server_details() {
        let resp = from_error(&Error::Internal("db password wrong".into()));
        assert_eq!(resp.status(), 500);
        assert_eq!(payload(&resp)["message"], "Internal Server Error");

        let resp = from_error(&Error::validation("Invalid", vec!["name".into()]));
        assert_eq!(resp.status(), 422);
        assert_eq!(payload(&resp)["errors"], json!(["name"]));
    }

    #[test]
    fn test_last_page() {
        assert_eq!(last_page(0, 10), 0);
        assert_eq!(last_page(10, 10), 1);
        assert_eq!(last_page(11, 10), 2);
        assert_eq!(last_page(5, 0), 0);
    }

    #[test]
    fn test_tabulator_envelope() {
        let resp = tabulator(vec![json!({"id": 1}), json!({"id": 2})], 25, 10, None);
        let body = payload(&resp);
        assert_eq!(body["last_page"], 3);
        assert_eq!(body["total"], 25);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    }
}
