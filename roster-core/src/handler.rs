// Handler return values and their normalization into responses

use crate::HttpResponse;
use serde_json::{Map, Value};

/// What a route handler may hand back.
///
/// The router folds every variant into an [`HttpResponse`]: responses pass
/// through, structured values become `Json`, everything else becomes `Raw`.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Response(HttpResponse),
    Structured(Value),
    Scalar(String),
    Empty,
}

impl HandlerOutput {
    pub fn into_response(self) -> HttpResponse {
        match self {
            HandlerOutput::Response(resp) => resp,
            HandlerOutput::Structured(value) => match value {
                Value::Object(_) | Value::Array(_) => HttpResponse::json(value),
                Value::Null => HttpResponse::raw(Vec::new()),
                Value::String(s) => HttpResponse::raw(s),
                other => HttpResponse::raw(other.to_string()),
            },
            HandlerOutput::Scalar(text) => HttpResponse::raw(text),
            HandlerOutput::Empty => HttpResponse::raw(Vec::new()),
        }
    }
}

impl From<HttpResponse> for HandlerOutput {
    fn from(resp: HttpResponse) -> Self {
        HandlerOutput::Response(resp)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Structured(value)
    }
}

impl From<Map<String, Value>> for HandlerOutput {
    fn from(map: Map<String, Value>) -> Self {
        HandlerOutput::Structured(Value::Object(map))
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Scalar(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Scalar(text.to_string())
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Empty
    }
}

impl From<bool> for HandlerOutput {
    fn from(value: bool) -> Self {
        HandlerOutput::Scalar(value.to_string())
    }
}

macro_rules! scalar_output {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for HandlerOutput {
                fn from(value: $ty) -> Self {
                    HandlerOutput::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_output!(i32, i64, u32, u64, usize, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_becomes_json() {
        let out: HandlerOutput = json!({"name": "Ada"}).into();
        assert_eq!(
            out.into_response(),
            HttpResponse::json(json!({"name": "Ada"}))
        );
    }

    #[test]
    fn test_string_becomes_raw() {
        let out: HandlerOutput = "hello".into();
        assert_eq!(out.into_response(), HttpResponse::raw("hello"));
    }

    #[test]
    fn test_response_passes_through() {
        let resp = HttpResponse::redirect("/login").with_header("X-A", "b");
        let out: HandlerOutput = resp.clone().into();
        assert_eq!(out.into_response(), resp);
    }

    #[test]
    fn test_scalars_and_empty() {
        assert_eq!(HandlerOutput::from(42i64).into_response(), HttpResponse::raw("42"));
        assert_eq!(HandlerOutput::from(()).into_response(), HttpResponse::raw(""));
        assert_eq!(
            HandlerOutput::from(json!(true)).into_response(),
            HttpResponse::raw("true")
        );
    }
}
