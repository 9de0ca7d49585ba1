//! Blocking HTTP/1.x request reader for the bundled transport.
//!
//! Reads one request head byte-by-byte up to the blank line, then the body
//! per `Content-Length` in a single read. Anything fancier (chunked
//! transfer, pipelining) is out of scope for this transport.
use std::collections::HashMap;
use std::fmt;
use std::io::prelude::*;
use std::str::FromStr;
use std::str::Utf8Error;

use percent_encoding::percent_decode_str;

use crate::request::{Header, Method, Request};

const MAX_HEAD_SIZE: usize = 16 * 1024;

impl FromStr for Method {
    type Err = RequestParseError;
    fn from_str(s: &str) -> Result<Method> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            "CONNECT" => Ok(Method::CONNECT),
            "OPTIONS" => Ok(Method::OPTIONS),
            "TRACE" => Ok(Method::TRACE),
            _ => Err(RequestParseError::new("invalid HTTP method")),
        }
    }
}

/// Parse one HTTP request from the stream. The body is read exactly once.
pub fn parse<R: Read>(stream: &mut R) -> Result<Request> {
    let head = read_head(stream)?;
    let head = std::str::from_utf8(&head)?;
    let mut lines = head.split("\r\n");

    let request_line = lines
        .next()
        .ok_or_else(|| RequestParseError::new("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestParseError::new("missing method"))?
        .parse::<Method>()?;
    let target = parts
        .next()
        .ok_or_else(|| RequestParseError::new("missing request target"))?;
    let version = parts
        .next()
        .ok_or_else(|| RequestParseError::new("missing protocol version"))?;
    if !version.starts_with("HTTP/1.") {
        return Err(RequestParseError::new("unsupported protocol version"));
    }
    // The router sees the unescaped path; the query string stays raw and
    // is decoded field by field on access.
    let (path, query) = split_target(target);
    let path = percent_decode_str(path).decode_utf8_lossy().into_owned();

    let mut headers: HashMap<Header, Vec<String>> = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let mut split = line.splitn(2, ':');
        let name = split
            .next()
            .ok_or_else(|| RequestParseError::new("malformed header"))?;
        let value = split
            .next()
            .ok_or_else(|| RequestParseError::new("malformed header"))?
            .trim();
        headers
            .entry(Header::new(name))
            .or_insert_with(Vec::new)
            .push(value.to_string());
    }

    let content_length = match headers.get(&Header::new("content-length")) {
        Some(values) => values[0]
            .parse::<usize>()
            .map_err(|_| RequestParseError::new("invalid content-length"))?,
        None => 0,
    };
    let mut body = vec![0; content_length];
    stream.read_exact(&mut body)?;

    Ok(Request::new(method, &path, query, headers, body))
}

fn read_head<R: Read>(stream: &mut R) -> Result<Vec<u8>> {
    let mut head = vec![];
    let mut byte = [0u8; 1];
    loop {
        if stream.read(&mut byte)? == 0 {
            return Err(RequestParseError::new("unexpected end of stream"));
        }
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") {
            head.truncate(head.len() - 4);
            return Ok(head);
        }
        if head.len() > MAX_HEAD_SIZE {
            return Err(RequestParseError::new("request head too large"));
        }
    }
}

/// Split a request target into path and query; a fragment is dropped.
fn split_target(target: &str) -> (&str, &str) {
    let target = match target.find('#') {
        Some(i) => &target[..i],
        None => target,
    };
    match target.find('?') {
        Some(i) => (&target[..i], &target[i + 1..]),
        None => (target, ""),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestParseError {
    reason: String,
}

impl RequestParseError {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RequestParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error parsing request: {}", self.reason)
    }
}

impl From<std::io::Error> for RequestParseError {
    fn from(err: std::io::Error) -> Self {
        RequestParseError::new(&err.to_string())
    }
}

impl From<Utf8Error> for RequestParseError {
    fn from(err: Utf8Error) -> Self {
        RequestParseError::new(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RequestParseError>;
