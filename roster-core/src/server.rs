//! Blocking HTTP/1.1 server.
//!
//! One thread per accepted connection, one request per connection. The
//! request head is parsed with `httparse`, the body is read by
//! `Content-Length` or decoded from `Transfer-Encoding: chunked`, and every
//! response is sent with `Connection: close`.

use crate::http::Headers;
use crate::middleware::Pipeline;
use crate::status::reason_phrase;
use crate::{HttpRequest, HttpResponse, HttpStatus};
use roster_log::{debug, error, info, warn};
use std::io::{self, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

const MAX_HEADERS: usize = 64;

/// Longest chunk-size line or trailer section accepted in a chunked body.
const MAX_CHUNK_META_BYTES: usize = 8 * 1024;

/// Limits applied while reading a request off the socket.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest request head (request line plus headers) accepted.
    pub max_header_bytes: usize,
    /// Largest `Content-Length` the server will read at all.
    pub max_body_bytes: usize,
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 8 * 1024 * 1024,
            read_timeout: Some(Duration::from_secs(30)),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    config: ServerConfig,
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        pipeline: Arc<Pipeline>,
        config: ServerConfig,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            pipeline,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails.
    pub fn serve(self) -> io::Result<()> {
        info!(target: "roster::server", "Listening on http://{}", self.local_addr()?);

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(target: "roster::server", "Failed to accept connection: {}", err);
                    continue;
                }
            };
            let pipeline = Arc::clone(&self.pipeline);
            let config = self.config.clone();
            std::thread::spawn(move || {
                if let Err(err) = serve_stream(stream, &pipeline, &config) {
                    debug!(target: "roster::server", "Connection error: {}", err);
                }
            });
        }

        Ok(())
    }
}

fn serve_stream(mut stream: TcpStream, pipeline: &Pipeline, config: &ServerConfig) -> io::Result<()> {
    stream.set_read_timeout(config.read_timeout)?;
    handle_connection(&mut stream, pipeline, config)
}

/// Why a request head could not be turned into a request.
#[derive(Debug, PartialEq, Eq)]
enum HeadError {
    TooLarge,
    Malformed,
    Closed,
}

struct RequestHead {
    method: String,
    target: String,
    headers: Headers,
    /// Body bytes that arrived together with the head.
    leftover: Vec<u8>,
}

/// Read one request from `stream`, run it through `pipeline` and write the
/// response back.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    pipeline: &Pipeline,
    config: &ServerConfig,
) -> io::Result<()> {
    let head = match read_head(stream, config.max_header_bytes)? {
        Ok(head) => head,
        Err(HeadError::Closed) => return Ok(()),
        Err(HeadError::TooLarge) => {
            return write_status(stream, HttpStatus::RequestHeaderFieldsTooLarge);
        }
        Err(HeadError::Malformed) => return write_status(stream, HttpStatus::BadRequest),
    };

    // Transfer-Encoding overrides Content-Length
    let body = match head.headers.get("transfer-encoding") {
        Some(coding) => {
            let last = coding.rsplit(',').next().unwrap_or("").trim();
            if !last.eq_ignore_ascii_case("chunked") {
                return write_status(stream, HttpStatus::NotImplemented);
            }
            match read_chunked(stream, head.leftover, config.max_body_bytes)? {
                Ok(body) => body,
                Err(status) => return write_status(stream, status),
            }
        }
        None => {
            let content_length = match head.headers.get("content-length") {
                None => 0,
                Some(value) => match value.trim().parse::<usize>() {
                    Ok(len) => len,
                    Err(_) => return write_status(stream, HttpStatus::BadRequest),
                },
            };
            if content_length > config.max_body_bytes {
                return write_status(stream, HttpStatus::PayloadTooLarge);
            }

            let mut body = head.leftover;
            body.truncate(content_length);
            if body.len() < content_length {
                let mut rest = vec![0u8; content_length - body.len()];
                stream.read_exact(&mut rest)?;
                body.extend_from_slice(&rest);
            }
            body
        }
    };

    let is_head = head.method.eq_ignore_ascii_case("HEAD");
    let request = HttpRequest::from_parts(head.method, &head.target, head.headers, body);

    let response = match pipeline.handle(&request) {
        Ok(response) => response,
        Err(err) => {
            error!(
                target: "roster::server",
                "Unrecovered error for {} {}: {}",
                request.method(),
                request.path(),
                err
            );
            HttpResponse::empty(HttpStatus::InternalServerError.code())
        }
    };

    write_response(stream, response, is_head)
}

fn read_head<S: Read>(stream: &mut S, max_header_bytes: usize) -> io::Result<Result<RequestHead, HeadError>> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(Err(if buf.is_empty() {
                HeadError::Closed
            } else {
                HeadError::Malformed
            }));
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                if head_len > max_header_bytes {
                    return Ok(Err(HeadError::TooLarge));
                }
                let method = req.method.unwrap_or("GET").to_string();
                let target = req.path.unwrap_or("/").to_string();
                let mut parsed = Headers::new();
                for header in req.headers.iter().filter(|h| !h.name.is_empty()) {
                    parsed.append(header.name, String::from_utf8_lossy(header.value));
                }
                return Ok(Ok(RequestHead {
                    method,
                    target,
                    headers: parsed,
                    leftover: buf[head_len..].to_vec(),
                }));
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > max_header_bytes {
                    return Ok(Err(HeadError::TooLarge));
                }
            }
            Err(httparse::Error::TooManyHeaders) => return Ok(Err(HeadError::TooLarge)),
            Err(_) => return Ok(Err(HeadError::Malformed)),
        }
    }
}

/// Append whatever the stream has next. `false` at end of stream.
fn fill<S: Read>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<bool> {
    let mut chunk = [0u8; 4096];
    let n = stream.read(&mut chunk)?;
    buf.extend_from_slice(&chunk[..n]);
    Ok(n > 0)
}

/// Decode a chunked body whose first bytes are already in `buf`.
///
/// Trailers are read and discarded. Framing errors map to 400, a decoded
/// body over `max_body_bytes` to 413.
fn read_chunked<S: Read>(
    stream: &mut S,
    mut buf: Vec<u8>,
    max_body_bytes: usize,
) -> io::Result<Result<Vec<u8>, HttpStatus>> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let size = loop {
            match httparse::parse_chunk_size(&buf[pos..]) {
                Ok(httparse::Status::Complete((used, size))) => {
                    pos += used;
                    break size;
                }
                Ok(httparse::Status::Partial) => {
                    if buf.len() - pos > MAX_CHUNK_META_BYTES || !fill(stream, &mut buf)? {
                        return Ok(Err(HttpStatus::BadRequest));
                    }
                }
                Err(_) => return Ok(Err(HttpStatus::BadRequest)),
            }
        };
        if size == 0 {
            break;
        }

        let size = usize::try_from(size).unwrap_or(usize::MAX);
        if body.len().saturating_add(size) > max_body_bytes {
            return Ok(Err(HttpStatus::PayloadTooLarge));
        }
        let framed = size + 2;
        while buf.len() - pos < framed {
            if !fill(stream, &mut buf)? {
                return Ok(Err(HttpStatus::BadRequest));
            }
        }
        if &buf[pos + size..pos + framed] != b"\r\n" {
            return Ok(Err(HttpStatus::BadRequest));
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += framed;
    }

    // Trailer section ends with an empty line
    loop {
        match buf[pos..].windows(2).position(|w| w == b"\r\n") {
            Some(0) => break,
            Some(line) => pos += line + 2,
            None => {
                if buf.len() - pos > MAX_CHUNK_META_BYTES || !fill(stream, &mut buf)? {
                    return Ok(Err(HttpStatus::BadRequest));
                }
            }
        }
    }

    Ok(Ok(body))
}

fn write_status<W: Write>(stream: &mut W, status: HttpStatus) -> io::Result<()> {
    write_response(
        stream,
        HttpResponse::empty(status.code()).with_body(status.reason()),
        false,
    )
}

fn write_response<W: Write>(stream: &mut W, response: HttpResponse, omit_body: bool) -> io::Result<()> {
    let (status, headers, body) = response.into_parts();
    let mut out = BufWriter::new(stream);

    write!(out, "HTTP/1.1 {} {}\r\n", status, reason_phrase(status))?;
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        write!(out, "{}: {}\r\n", name, value)?;
    }
    write!(out, "Content-Length: {}\r\nConnection: close\r\n\r\n", body.len())?;
    if !omit_body {
        out.write_all(&body)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, MiddlewareChain, Router};
    use std::io::Cursor;

    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pipeline() -> Pipeline {
        let router = Router::new()
            .get("/hello/{name}", |_req, params| {
                Ok(format!("hello {}", params.get("name").unwrap_or("")))
            })
            .post("/echo", |req, _params| {
                Ok(String::from_utf8_lossy(req.body()).into_owned())
            })
            .get("/fail", |_req, _params| -> Result<(), Error> {
                Err(Error::Internal("boom".into()))
            });
        Pipeline::build(MiddlewareChain::new(), router)
    }

    fn roundtrip(raw: &[u8], config: &ServerConfig) -> String {
        let mut stream = MockStream::new(raw);
        handle_connection(&mut stream, &pipeline(), config).unwrap();
        stream.output()
    }

    #[test]
    fn test_simple_get() {
        let out = roundtrip(b"GET /hello/ada HTTP/1.1\r\nHost: x\r\n\r\n", &ServerConfig::default());
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.contains("Content-Length: 9\r\n"));
        assert!(out.ends_with("\r\n\r\nhello ada"));
    }

    #[test]
    fn test_post_body_by_content_length() {
        let out = roundtrip(
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA",
            &ServerConfig::default(),
        );
        assert!(out.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_post_body_chunked() {
        let out = roundtrip(
            b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\nX-Trailer: t\r\n\r\n",
            &ServerConfig::default(),
        );
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\nhello world"));
    }

    #[test]
    fn test_chunked_overrides_content_length() {
        let out = roundtrip(
            b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
            &ServerConfig::default(),
        );
        assert!(out.ends_with("\r\n\r\nabc"));
    }

    #[test]
    fn test_bad_chunked_framing_is_400() {
        let truncated = roundtrip(
            b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel",
            &ServerConfig::default(),
        );
        assert!(truncated.starts_with("HTTP/1.1 400 "));

        let bad_size = roundtrip(
            b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nhello\r\n0\r\n\r\n",
            &ServerConfig::default(),
        );
        assert!(bad_size.starts_with("HTTP/1.1 400 "));
    }

    #[test]
    fn test_chunked_body_too_large_is_413() {
        let config = ServerConfig {
            max_body_bytes: 4,
            ..ServerConfig::default()
        };
        let out = roundtrip(
            b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n",
            &config,
        );
        assert!(out.starts_with("HTTP/1.1 413 "));
    }

    #[test]
    fn test_unsupported_transfer_coding_is_501() {
        let out = roundtrip(
            b"POST /echo HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\nxx",
            &ServerConfig::default(),
        );
        assert!(out.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    }

    #[test]
    fn test_malformed_head_is_400() {
        let out = roundtrip(b"NOT A REQUEST\r\n\r\n", &ServerConfig::default());
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_oversized_head_is_431() {
        let config = ServerConfig {
            max_header_bytes: 64,
            ..ServerConfig::default()
        };
        let mut raw = b"GET / HTTP/1.1\r\nX-Padding: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', 200));
        raw.extend_from_slice(b"\r\n\r\n");
        let out = roundtrip(&raw, &config);
        assert!(out.starts_with("HTTP/1.1 431 "));
    }

    #[test]
    fn test_unrecovered_error_is_bare_500() {
        let out = roundtrip(b"GET /fail HTTP/1.1\r\n\r\n", &ServerConfig::default());
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(out.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn test_declared_body_too_large_is_413() {
        let config = ServerConfig {
            max_body_bytes: 4,
            ..ServerConfig::default()
        };
        let out = roundtrip(b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\n", &config);
        assert!(out.starts_with("HTTP/1.1 413 "));
    }

    #[test]
    fn test_head_omits_body() {
        let router = Router::new().route(crate::HttpMethod::HEAD, "/", |_req, _p| Ok("body"));
        let pipeline = Pipeline::build(MiddlewareChain::new(), router);
        let mut stream = MockStream::new(b"HEAD / HTTP/1.1\r\n\r\n");
        handle_connection(&mut stream, &pipeline, &ServerConfig::default()).unwrap();
        let out = stream.output();
        assert!(out.contains("Content-Length: 4\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_head_on_get_route_is_200_without_body() {
        let out = roundtrip(b"HEAD /hello/ada HTTP/1.1\r\n\r\n", &ServerConfig::default());
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
        assert!(!out.contains("ada"));
    }

    #[test]
    fn test_encoded_slash_reaches_handler_as_one_param() {
        let out = roundtrip(b"GET /hello/a%2Fb HTTP/1.1\r\n\r\n", &ServerConfig::default());
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("a/b"));
    }

    #[test]
    fn test_closed_connection_writes_nothing() {
        let out = roundtrip(b"", &ServerConfig::default());
        assert!(out.is_empty());
    }
}
