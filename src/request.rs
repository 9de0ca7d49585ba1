//! HTTP request model.
//!
//! A [`Request`] wraps the inbound half of one exchange: method, path,
//! query, header multimap, path parameters bound by the router, and the raw
//! body bytes as read once from the transport. Form decoding is lazy and
//! memoized; the body stream is never re-read.
use std::collections::HashMap;
use std::fmt;
use std::hash;

use percent_encoding::percent_decode_str;

use crate::body::{self, FormData, UploadedFile};

/// HTTP methods with registerable handlers, plus the rest of the standard
/// set so the transport can represent any request it parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    CONNECT,
    OPTIONS,
    TRACE,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Case-insensitive header name.
#[derive(Debug, Clone)]
pub struct Header(String);

impl Header {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl Eq for Header {}

impl hash::Hash for Header {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.to_lowercase().hash(state);
    }
}

impl From<String> for Header {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Header> for String {
    fn from(h: Header) -> Self {
        h.0
    }
}

/// An in-flight HTTP request. Owned by one handler invocation, not retained
/// past handler return.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    headers: HashMap<Header, Vec<String>>,
    body: Vec<u8>,
    params: HashMap<String, String>,
    // Memoized decode of the body; filled on first access.
    form: Option<FormData>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(
            Method::GET,
            "/",
            "",
            vec![(Header::new("Host"), vec!["localhost".to_string()])]
                .into_iter()
                .collect(),
            vec![],
        )
    }
}

impl Request {
    pub fn new(
        method: Method,
        path: &str,
        query: &str,
        headers: HashMap<Header, Vec<String>>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            headers,
            body,
            params: HashMap::new(),
            form: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(Header::new(name))
            .or_insert_with(Vec::new)
            .push(value.to_string());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self.form = None;
        self
    }

    /// First value of a header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&Header::new(name))
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    /// All values of a header.
    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers
            .get(&Header::new(name))
            .map(|values| &values[..])
            .unwrap_or(&[])
    }

    /// Path parameter bound by the matched route template.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub(crate) fn set_param(&mut self, name: &str, value: String) {
        self.params.insert(name.to_string(), value);
    }

    /// Decoded query string field.
    pub fn query_param(&self, name: &str) -> Option<String> {
        body::parse_urlencoded(&self.query)
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Cookie value from the `Cookie` header, percent-decoded.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header("cookie")?;
        for entry in header.split(';') {
            let mut split = entry.trim().splitn(2, '=');
            if split.next() == Some(name) {
                let value = split.next().unwrap_or("");
                return Some(percent_decode_str(value).decode_utf8_lossy().into_owned());
            }
        }
        None
    }

    /// Raw body bytes, as read from the transport.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decoded form field by name. Triggers the (memoized) body decode.
    pub fn form(&mut self, name: &str) -> Option<&str> {
        self.decoded().fields.get(name).map(|s| s.as_str())
    }

    /// Uploaded file by field name. Triggers the (memoized) body decode.
    pub fn file(&mut self, name: &str) -> Option<&UploadedFile> {
        self.decoded().files.get(name)
    }

    /// All decoded form fields.
    pub fn form_fields(&mut self) -> &HashMap<String, String> {
        &self.decoded().fields
    }

    /// All uploaded files.
    pub fn files(&mut self) -> &HashMap<String, UploadedFile> {
        &self.decoded().files
    }

    fn decoded(&mut self) -> &FormData {
        if self.form.is_none() {
            let content_type = self.header("content-type").map(|s| s.to_string());
            self.form = Some(body::decode(&self.body, content_type.as_deref()));
        }
        self.form.as_ref().unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = Request::default().with_header("Content-Type", "text/plain");
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_header_multimap() {
        let request = Request::default()
            .with_header("Accept", "text/html")
            .with_header("accept", "application/json");
        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(request.header_all("Accept").len(), 2);
    }

    #[test]
    fn test_cookie_parsing() {
        let request =
            Request::default().with_header("Cookie", "a=1; sessionId=abc%20def ;empty=");
        assert_eq!(request.cookie("a"), Some("1".to_string()));
        assert_eq!(request.cookie("sessionId"), Some("abc def".to_string()));
        assert_eq!(request.cookie("empty"), Some("".to_string()));
        assert_eq!(request.cookie("missing"), None);
    }

    #[test]
    fn test_query_param() {
        let mut request = Request::default();
        request.query = "q=hello%20there&page=2".to_string();
        assert_eq!(request.query_param("q"), Some("hello there".to_string()));
        assert_eq!(request.query_param("page"), Some("2".to_string()));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_form_decode_is_memoized() {
        let mut request = Request::default()
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(b"a=1&b=2".to_vec());
        assert_eq!(request.form("a"), Some("1"));
        // Mutating the raw body after the first decode must not change the
        // decoded view; the decode happens exactly once.
        request.body = b"a=99".to_vec();
        assert_eq!(request.form("a"), Some("1"));
        assert_eq!(request.form("b"), Some("2"));
    }

    #[test]
    fn test_clone_carries_decoded_form() {
        let mut request = Request::default()
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(b"a=1&b=2".to_vec());
        assert_eq!(request.form("a"), Some("1"));
        let mut clone = request.clone();
        assert_eq!(clone.form("a"), Some("1"));
        assert_eq!(clone.form("b"), Some("2"));
    }

    #[test]
    fn test_text_body() {
        let request = Request::default().with_body(b"hello".to_vec());
        assert_eq!(request.text(), "hello");
        assert_eq!(request.body(), b"hello");
    }
}
