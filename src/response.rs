//! HTTP response model and status codes.
//!
//! A [`Response`] accumulates status, headers and body for one exchange.
//! The transport flushes it exactly once after the handler returns; a
//! second `send_*` call is ignored with a warning (single-flush contract).
use log::warn;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::json::Json;

/// An HTTP response under construction.
///
/// # Example
/// ```
/// use expresso::response::Response;
///
/// let mut response = Response::new();
/// response.status(404);
/// response.send_text("no such thing");
/// assert_eq!(response.status_code(), 404);
/// assert_eq!(response.body(), b"no such thing");
/// ```
#[derive(Debug)]
pub struct Response {
    status_code: u16,
    status: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    sent: bool,
    keep_open: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            status: default_status(200).to_string(),
            headers: vec![],
            body: vec![],
            sent: false,
            keep_open: false,
        }
    }

    /// Set the status code; the reason phrase follows automatically.
    pub fn status(&mut self, status_code: u16) -> &mut Self {
        self.status_code = status_code;
        self.status = default_status(status_code).to_string();
        self
    }

    /// Add a response header. Headers accumulate; setting the same name
    /// twice produces two header lines on the wire.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a `Set-Cookie` header. The value is percent-encoded; attributes
    /// (like `Path=/;Max-Age=60`) are appended verbatim.
    pub fn cookie(&mut self, name: &str, value: &str, attributes: &str) -> &mut Self {
        let value = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
        let cookie = if attributes.is_empty() {
            format!("{}={}", name, value)
        } else {
            format!("{}={};{}", name, value, attributes)
        };
        self.set_header("Set-Cookie", &cookie)
    }

    /// Send raw bytes. Content type is the caller's business.
    pub fn send_bytes(&mut self, body: Vec<u8>) {
        if self.sent {
            warn!("response already sent, ignoring extra send");
            return;
        }
        self.body = body;
        self.sent = true;
    }

    /// Send UTF-8 text as `text/plain`.
    pub fn send_text(&mut self, body: &str) {
        if self.sent {
            warn!("response already sent, ignoring extra send");
            return;
        }
        self.set_header("Content-Type", "text/plain; charset=UTF-8");
        self.send_bytes(body.as_bytes().to_vec());
    }

    /// Serialize a JSON value and send it as `application/json`.
    pub fn send_json(&mut self, value: &Json) {
        if self.sent {
            warn!("response already sent, ignoring extra send");
            return;
        }
        self.set_header("Content-Type", "application/json; charset=UTF-8");
        self.send_bytes(value.stringify().into_bytes());
    }

    /// Whether a send has already happened.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Direct the transport to leave the connection open after the handler
    /// returns, e.g. for responses that stream more bytes asynchronously.
    ///
    /// The bundled TCP transport only skips its explicit shutdown; it still
    /// drops the stream when the exchange ends, which closes the socket.
    /// Acting on this directive requires a transport that hands the stream
    /// to something outliving the exchange.
    pub fn keep_open(&mut self, keep_open: bool) -> &mut Self {
        self.keep_open = keep_open;
        self
    }

    pub fn must_keep_open(&self) -> bool {
        self.keep_open
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers with the given name.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Write HTTP/1.1 response bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        let mut bytes: Vec<u8> = vec![];

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status);
        bytes.extend(status_line.into_bytes());

        if !self.body.is_empty() {
            self.headers
                .push(("Content-Length".to_string(), self.body.len().to_string()));
        }
        for (header, value) in &self.headers {
            let header_line = format!("{}: {}\r\n", header, value);
            bytes.extend(header_line.into_bytes());
        }

        bytes.extend(b"\r\n");
        bytes.extend(&self.body);
        bytes
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Default reason phrase for a status code.
fn default_status(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
