// HTTP status codes used by the pipeline, the envelopes and the server

macro_rules! statuses {
    ($($variant:ident = $code:literal, $reason:literal;)+) => {
        /// HTTP status codes the backend produces.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum HttpStatus {
            $($variant = $code,)+
        }

        impl HttpStatus {
            /// Reason phrase written on the status line.
            pub fn reason(&self) -> &'static str {
                match self {
                    $(HttpStatus::$variant => $reason,)+
                }
            }

            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(HttpStatus::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    Ok = 200, "OK";
    Created = 201, "Created";
    NoContent = 204, "No Content";
    Found = 302, "Found";
    SeeOther = 303, "See Other";
    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    Conflict = 409, "Conflict";
    PayloadTooLarge = 413, "Payload Too Large";
    UnprocessableEntity = 422, "Unprocessable Entity";
    RequestHeaderFieldsTooLarge = 431, "Request Header Fields Too Large";
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }
}

/// Reason phrase for any numeric status, falling back to the class name.
pub fn reason_phrase(code: u16) -> &'static str {
    if let Some(status) = HttpStatus::from_code(code) {
        return status.reason();
    }
    match code / 100 {
        1 => "Informational",
        2 => "OK",
        3 => "Redirection",
        4 => "Client Error",
        _ => "Server Error",
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}
