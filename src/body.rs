//! Request body decoding.
//!
//! Decodes raw body bytes into form fields and uploaded files based on the
//! declared content type. Decoding is best-effort: malformed input degrades
//! to empty maps instead of failing the request, so a broken client upload
//! never turns into a server error.
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use percent_encoding::percent_decode_str;
use uuid::Uuid;

/// A file received in a `multipart/form-data` part that declared a
/// `filename` attribute. The payload is kept byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// File name as supplied by the client.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Write the payload to the given path.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.bytes)
    }
    /// Write the payload to a fresh file in the system temp directory and
    /// return its path.
    pub fn save_temp(&self) -> io::Result<PathBuf> {
        let path = env::temp_dir().join(format!("upload-{}", Uuid::new_v4()));
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Decoded request body: text fields and file uploads by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

/// Decode a raw body according to its content type. Unrecognized content
/// types yield empty maps; the caller still has the raw bytes.
pub fn decode(raw: &[u8], content_type: Option<&str>) -> FormData {
    match content_type {
        Some(ct) if ct.contains("application/x-www-form-urlencoded") => decode_urlencoded(raw),
        Some(ct) if ct.contains("multipart/form-data") => decode_multipart(raw, ct),
        _ => FormData::default(),
    }
}

/// Percent-decode a form-encoded token, with `+` meaning space.
pub(crate) fn url_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

fn decode_urlencoded(raw: &[u8]) -> FormData {
    let text = String::from_utf8_lossy(raw);
    let mut form = FormData::default();
    for (name, value) in parse_urlencoded(&text) {
        form.fields.insert(name, value);
    }
    form
}

/// Split a `key=value&key=value` string into decoded pairs. Also used for
/// query strings. A pair without `=` is a key with an empty value.
pub(crate) fn parse_urlencoded(text: &str) -> Vec<(String, String)> {
    let mut pairs = vec![];
    for pair in text.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut split = pair.splitn(2, '=');
        let name = split.next().unwrap_or("");
        let value = split.next().unwrap_or("");
        pairs.push((url_decode(name), url_decode(value)));
    }
    pairs
}

fn decode_multipart(raw: &[u8], content_type: &str) -> FormData {
    let mut form = FormData::default();
    let boundary = match attribute(content_type, "boundary") {
        Some(b) => b,
        None => {
            warn!("multipart body without boundary parameter, ignoring");
            return form;
        }
    };
    let delimiter = format!("--{}", boundary).into_bytes();
    for part in split_on(raw, &delimiter) {
        let part = strip_prefix(part, b"\r\n");
        // The closing delimiter leaves a "--" part, the preamble an empty one.
        if part.is_empty() || part.starts_with(b"--") {
            continue;
        }
        let header_end = match find(part, b"\r\n\r\n") {
            Some(i) => i,
            None => continue,
        };
        let headers = String::from_utf8_lossy(&part[..header_end]);
        // Slice the body by byte offsets so binary payloads survive intact.
        let mut body = &part[header_end + 4..];
        if body.ends_with(b"\r\n") {
            body = &body[..body.len() - 2];
        }
        let disposition = match headers
            .lines()
            .find(|line| line.to_ascii_lowercase().starts_with("content-disposition"))
        {
            Some(line) => line,
            None => continue,
        };
        let name = match quoted_attribute(disposition, "name") {
            Some(name) => name,
            None => continue,
        };
        // A filename attribute, even an empty one, makes the part a file.
        match quoted_attribute(disposition, "filename") {
            Some(file_name) => {
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        bytes: body.to_vec(),
                    },
                );
            }
            None => {
                form.fields
                    .insert(name, String::from_utf8_lossy(body).into_owned());
            }
        }
    }
    form
}

/// Extract an unquoted or quoted `key=value` attribute from a header value.
fn attribute(header: &str, key: &str) -> Option<String> {
    for part in header.split(';') {
        let mut split = part.trim().splitn(2, '=');
        if split.next() == Some(key) {
            let value = split.next().unwrap_or("");
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

/// Extract a quoted attribute like `name="value"`. The value is taken up to
/// the next `"`; backslash-escaped quotes are not honored. Best effort.
fn quoted_attribute(header: &str, key: &str) -> Option<String> {
    let needle = format!("{}=\"", key);
    let mut search = 0;
    while let Some(offset) = header[search..].find(&needle) {
        let at = search + offset;
        let value_start = at + needle.len();
        // Guard against "name" matching inside "filename".
        if at == 0 || matches!(header.as_bytes()[at - 1], b' ' | b';') {
            let rest = &header[value_start..];
            return rest.find('"').map(|end| rest[..end].to_string());
        }
        search = value_start;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn strip_prefix<'a>(bytes: &'a [u8], prefix: &[u8]) -> &'a [u8] {
    if bytes.starts_with(prefix) {
        &bytes[prefix.len()..]
    } else {
        bytes
    }
}

fn split_on<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = vec![];
    let mut start = 0;
    let mut i = 0;
    while i + delimiter.len() <= haystack.len() {
        if &haystack[i..i + delimiter.len()] == delimiter {
            parts.push(&haystack[start..i]);
            i += delimiter.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&haystack[start..]);
    parts
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_urlencoded_round_trip() {
        let form = decode(
            b"key=hello%20world&empty=",
            Some("application/x-www-form-urlencoded"),
        );
        assert_eq!(form.fields.get("key"), Some(&"hello world".to_string()));
        assert_eq!(form.fields.get("empty"), Some(&"".to_string()));
        assert!(form.files.is_empty());
    }

    #[test]
    fn test_urlencoded_plus_and_missing_equals() {
        let form = decode(b"a=one+two&flag", Some("application/x-www-form-urlencoded"));
        assert_eq!(form.fields.get("a"), Some(&"one two".to_string()));
        assert_eq!(form.fields.get("flag"), Some(&"".to_string()));
    }

    fn multipart_body(boundary: &str) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n",
        );
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
              Content-Type: application/octet-stream\r\n\r\n",
        );
        // Binary payload containing CRLF sequences and a NUL byte.
        body.extend_from_slice(b"\x89PNG\r\n\x1a\n\x00data\r\nmore");
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body
    }

    #[test]
    fn test_multipart_field_and_binary_file() {
        let body = multipart_body("XBOUND");
        let form = decode(&body, Some("multipart/form-data; boundary=XBOUND"));

        assert_eq!(form.fields.get("title"), Some(&"Hello".to_string()));
        let file = form.files.get("avatar").unwrap();
        assert_eq!(file.file_name, "a.png");
        assert_eq!(&file.bytes[..], b"\x89PNG\r\n\x1a\n\x00data\r\nmore");
    }

    #[test]
    fn test_multipart_quoted_boundary() {
        let body = multipart_body("XBOUND");
        let form = decode(&body, Some("multipart/form-data; boundary=\"XBOUND\""));
        assert_eq!(form.fields.get("title"), Some(&"Hello".to_string()));
    }

    #[test]
    fn test_multipart_empty_filename_is_a_file() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"up\"; filename=\"\"\r\n\r\n\r\n--B--\r\n";
        let form = decode(body, Some("multipart/form-data; boundary=B"));
        let file = form.files.get("up").unwrap();
        assert_eq!(file.file_name, "");
        assert!(file.bytes.is_empty());
        assert!(form.fields.is_empty());
    }

    #[test]
    fn test_multipart_missing_boundary_degrades() {
        let form = decode(b"whatever", Some("multipart/form-data"));
        assert!(form.fields.is_empty());
        assert!(form.files.is_empty());
    }

    #[test]
    fn test_multipart_malformed_part_skipped() {
        let body = b"--B\r\nno blank line separator--B--\r\n";
        let form = decode(body, Some("multipart/form-data; boundary=B"));
        assert!(form.fields.is_empty());
    }

    #[test]
    fn test_other_content_type_yields_empty_maps() {
        let form = decode(b"{\"a\":1}", Some("application/json"));
        assert!(form.fields.is_empty());
        assert!(form.files.is_empty());
        let form = decode(b"raw", None);
        assert!(form.fields.is_empty());
    }
}
