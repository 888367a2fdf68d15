// HTTP response variants

use crate::http::Headers;
use crate::HttpStatus;
use serde::Serialize;

/// The three shapes a response can take.
///
/// Status defaults to 200 for `Raw` and `Json`, 302 for `Redirect`.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpResponse {
    Raw {
        body: Vec<u8>,
        status: u16,
        headers: Headers,
    },
    Json {
        payload: serde_json::Value,
        status: u16,
        headers: Headers,
    },
    Redirect {
        location: String,
        status: u16,
        headers: Headers,
    },
}

impl HttpResponse {
    /// Raw body with status 200.
    pub fn raw(body: impl Into<Vec<u8>>) -> Self {
        HttpResponse::Raw {
            body: body.into(),
            status: 200,
            headers: Headers::new(),
        }
    }

    /// Plain status with an empty body.
    pub fn empty(status: u16) -> Self {
        HttpResponse::Raw {
            body: Vec::new(),
            status,
            headers: Headers::new(),
        }
    }

    pub fn ok() -> Self {
        Self::empty(HttpStatus::Ok.code())
    }

    pub fn no_content() -> Self {
        Self::empty(HttpStatus::NoContent.code())
    }

    pub fn not_found() -> Self {
        Self::empty(HttpStatus::NotFound.code()).with_body("Not Found")
    }

    /// JSON payload with status 200.
    pub fn json(payload: serde_json::Value) -> Self {
        HttpResponse::Json {
            payload,
            status: 200,
            headers: Headers::new(),
        }
    }

    /// Serialize `value` into a JSON response.
    pub fn json_from<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        let payload =
            serde_json::to_value(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        Ok(Self::json(payload))
    }

    /// 302 redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        HttpResponse::Redirect {
            location: location.into(),
            status: HttpStatus::Found.code(),
            headers: Headers::new(),
        }
    }

    /// 303 redirect, used after a form POST.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::redirect(location).with_status(HttpStatus::SeeOther.code())
    }

    pub fn with_status(mut self, code: u16) -> Self {
        match &mut self {
            HttpResponse::Raw { status, .. }
            | HttpResponse::Json { status, .. }
            | HttpResponse::Redirect { status, .. } => *status = code,
        }
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_mut().insert(name, value);
        self
    }

    /// Replace the body of a `Raw` response; other variants are unchanged.
    pub fn with_body(mut self, new_body: impl Into<Vec<u8>>) -> Self {
        if let HttpResponse::Raw { body, .. } = &mut self {
            *body = new_body.into();
        }
        self
    }

    pub fn status(&self) -> u16 {
        match self {
            HttpResponse::Raw { status, .. }
            | HttpResponse::Json { status, .. }
            | HttpResponse::Redirect { status, .. } => *status,
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            HttpResponse::Raw { headers, .. }
            | HttpResponse::Json { headers, .. }
            | HttpResponse::Redirect { headers, .. } => headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            HttpResponse::Raw { headers, .. }
            | HttpResponse::Json { headers, .. }
            | HttpResponse::Redirect { headers, .. } => headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    pub fn is_json(&self) -> bool {
        matches!(self, HttpResponse::Json { .. })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, HttpResponse::Redirect { .. })
    }

    /// Flatten into status, wire headers and body bytes.
    ///
    /// Fills in `Content-Type` for raw and JSON bodies and `Location` for
    /// redirects unless a header of that name was set explicitly.
    pub fn into_parts(self) -> (u16, Headers, Vec<u8>) {
        match self {
            HttpResponse::Raw {
                body,
                status,
                mut headers,
            } => {
                if !headers.contains("content-type") && !body.is_empty() {
                    headers.insert("Content-Type", "text/html; charset=utf-8");
                }
                (status, headers, body)
            }
            HttpResponse::Json {
                payload,
                status,
                mut headers,
            } => {
                if !headers.contains("content-type") {
                    headers.insert("Content-Type", "application/json");
                }
                (status, headers, payload.to_string().into_bytes())
            }
            HttpResponse::Redirect {
                location,
                status,
                mut headers,
            } => {
                if !headers.contains("location") {
                    headers.insert("Location", location);
                }
                (status, headers, Vec::new())
            }
        }
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}
