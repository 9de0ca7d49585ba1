//! Static file resolution.
use std::fs;
use std::path::Path;

use log::warn;

/// Resolve a request path against a root directory. A directory resolves to
/// its `index.html`. Returns the file bytes and a mime type, or `None` when
/// nothing readable matches (routing then proceeds).
pub fn resolve(root: &Path, request_path: &str) -> Option<(Vec<u8>, &'static str)> {
    let requested = root.join(request_path.trim_start_matches('/'));
    let requested = requested.canonicalize().ok()?;

    // Prevent serving files above root from path traversals like
    // ../../../etc/passwd
    if !is_parent(root, &requested) {
        warn!("path traversal attempted: {:?}", &requested);
        return None;
    }

    let requested = if requested.is_dir() {
        requested.join("index.html")
    } else {
        requested
    };
    if !requested.is_file() {
        return None;
    }
    let mime = mime_type(&requested);
    fs::read(&requested).ok().map(|contents| (contents, mime))
}

/// Check if root is parent of target. Make sure both are canonical
/// by calling `canonicalize()` first if you want it to work reliably.
fn is_parent(root: &Path, target: &Path) -> bool {
    let mut curr = target;
    loop {
        if curr == root {
            return true;
        }
        curr = match curr.parent() {
            Some(parent) => parent,
            None => return false,
        };
    }
}

/// Mime type by file extension.
fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("css") => "text/css",
        Some("htm") | Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn fixture_root() -> PathBuf {
        let dir = tempfile::tempdir().unwrap().into_path();
        fs::write(dir.join("style.css"), "body {}").unwrap();
        fs::write(dir.join("notes.txt"), "notes").unwrap();
        fs::write(dir.join("blob.bin"), [0u8, 1, 2]).unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("index.html"), "<html></html>").unwrap();
        dir.canonicalize().unwrap()
    }

    #[test]
    fn test_resolve_file_with_mime() {
        let root = fixture_root();
        let (contents, mime) = resolve(&root, "/style.css").unwrap();
        assert_eq!(contents, b"body {}");
        assert_eq!(mime, "text/css");
        let (_, mime) = resolve(&root, "/notes.txt").unwrap();
        assert_eq!(mime, "text/plain");
        let (_, mime) = resolve(&root, "/blob.bin").unwrap();
        assert_eq!(mime, "application/octet-stream");
    }

    #[test]
    fn test_directory_resolves_to_index_html() {
        let root = fixture_root();
        let (contents, mime) = resolve(&root, "/sub").unwrap();
        assert_eq!(contents, b"<html></html>");
        assert_eq!(mime, "text/html");
    }

    #[test]
    fn test_missing_file_is_none() {
        let root = fixture_root();
        assert!(resolve(&root, "/nope.html").is_none());
    }

    #[test]
    fn test_path_traversal_is_blocked() {
        let root = fixture_root();
        let outside = root.parent().unwrap().join("secret.txt");
        fs::write(&outside, "secret").unwrap();
        assert!(resolve(&root, "/../secret.txt").is_none());
    }
}
