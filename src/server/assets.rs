//! Static asset short-circuit.
//!
//! Requests whose path names a file under the public root are streamed from
//! disk without touching the application kernel.
//!
//! # Content Types
//!
//! | Extension | Content-Type |
//! |-----------|--------------|
//! | `css` | `text/css` |
//! | `js` | `application/javascript` |
//! | `png` | `image/png` |
//! | `jpg`, `jpeg` | `image/jpeg` |
//! | `svg` | `image/svg+xml` |
//! | `woff` / `woff2` | `font/woff` / `font/woff2` |
//! | `eot` | `application/vnd.ms-fontobject` |
//! | `ttf` | `font/ttf` |
//!
//! Any other extension is looked up in the `mime_guess` registry. Files
//! the registry does not know are sniffed from their first bytes with
//! `infer`; unrecognized UTF-8 text is served as `text/plain`.

// ============================================================================
// Imports
// ============================================================================

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use super::dispatch::ProxyBody;
use super::in_flight::InFlightGuard;

// ============================================================================
// Constants
// ============================================================================

/// Bytes read from the file head when sniffing.
const SNIFF_LEN: usize = 512;

/// Fallback for content that matches nothing.
const OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// StaticFile
// ============================================================================

/// An opened asset ready to stream.
#[derive(Debug)]
pub(crate) struct StaticFile {
    /// Resolved path on disk.
    pub path: PathBuf,
    /// Open handle positioned at the start.
    pub file: File,
    /// File length in bytes.
    pub len: u64,
    /// Selected content type.
    pub content_type: &'static str,
}

// ============================================================================
// Path Resolution
// ============================================================================

/// Maps a request path onto the public root.
///
/// Returns `None` for any path containing a parent-directory segment, in
/// raw or percent-encoded form. No filesystem access happens here.
pub(crate) fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    if request_path.contains("../") || request_path.contains("..\\") {
        return None;
    }

    let decoded = urlencoding::decode(request_path).ok()?;

    if decoded.contains('\0')
        || decoded
            .split(['/', '\\'])
            .any(|segment| segment == "..")
    {
        return None;
    }

    let relative = decoded.trim_start_matches(['/', '\\']);
    if relative.is_empty() {
        return None;
    }

    Some(root.join(relative))
}

/// Opens the asset for `request_path`, if one exists.
///
/// Directories and missing files yield `None`.
pub(crate) async fn open(root: &Path, request_path: &str) -> Option<StaticFile> {
    let path = resolve(root, request_path)?;

    let metadata = tokio::fs::metadata(&path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let mut file = File::open(&path).await.ok()?;

    let content_type = match content_type_for_extension(&path) {
        Some(content_type) => content_type,
        None => {
            let mut head = vec![0u8; SNIFF_LEN];
            let read = file.read(&mut head).await.ok()?;
            file.seek(SeekFrom::Start(0)).await.ok()?;
            sniff(&head[..read])
        }
    };

    trace!(path = %path.display(), content_type, "Static asset matched");

    Some(StaticFile {
        path,
        file,
        len: metadata.len(),
        content_type,
    })
}

// ============================================================================
// Response
// ============================================================================

/// Builds a streamed `200` response for an opened asset.
///
/// The guard rides along with the body stream, keeping the request in
/// flight until the last chunk is written or the stream is dropped.
pub(crate) fn response(asset: StaticFile, guard: InFlightGuard) -> Response<ProxyBody> {
    debug!(path = %asset.path.display(), len = asset.len, "Serving static asset");

    let stream = ReaderStream::new(asset.file).map(move |chunk| {
        let _in_flight = &guard;
        chunk.map(Frame::data)
    });

    let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, http::HeaderValue::from_static(asset.content_type));
    headers.insert(CONTENT_LENGTH, http::HeaderValue::from(asset.len));

    response
}

// ============================================================================
// Content Types
// ============================================================================

/// Looks up the content type by file extension.
pub(crate) fn content_type_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    let content_type = match extension.as_str() {
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "eot" => "application/vnd.ms-fontobject",
        "ttf" => "font/ttf",
        _ => return registry_lookup(path),
    };

    Some(content_type)
}

/// Looks up extensions outside the primary table in the shared registry.
fn registry_lookup(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Guesses a content type from leading bytes.
pub(crate) fn sniff(head: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    match std::str::from_utf8(head) {
        Ok(text) if !text.contains('\0') => "text/plain",
        _ => OCTET_STREAM,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_resolve_plain_path() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve(root, "/css/app.css"),
            Some(PathBuf::from("/srv/public/css/app.css"))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve(root, "/../secret.txt"), None);
        assert_eq!(resolve(root, "/css/../../secret.txt"), None);
        assert_eq!(resolve(root, "/%2e%2e/secret.txt"), None);
        assert_eq!(resolve(root, "/css/%2E%2E%2Fsecret.txt"), None);
        assert_eq!(resolve(root, "/..%5csecret.txt"), None);
    }

    #[test]
    fn test_resolve_rejects_root() {
        assert_eq!(resolve(Path::new("/srv/public"), "/"), None);
    }

    #[test]
    fn test_extension_table() {
        let cases = [
            ("a.css", "text/css"),
            ("a.js", "application/javascript"),
            ("a.png", "image/png"),
            ("a.jpg", "image/jpeg"),
            ("a.JPEG", "image/jpeg"),
            ("a.svg", "image/svg+xml"),
            ("a.woff", "font/woff"),
            ("a.woff2", "font/woff2"),
            ("a.eot", "application/vnd.ms-fontobject"),
            ("a.ttf", "font/ttf"),
            ("a.html", "text/html"),
            ("a.csv", "text/csv"),
            ("a.ics", "text/calendar"),
            (
                "report.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
            (
                "sheet.xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
        ];

        for (file, expected) in cases {
            assert_eq!(
                content_type_for_extension(Path::new(file)),
                Some(expected),
                "{file}"
            );
        }
        assert_eq!(content_type_for_extension(Path::new("LICENSE")), None);
        assert_eq!(content_type_for_extension(Path::new("a.unknownext")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(sniff(b"GIF89a...."), "image/gif");
        assert_eq!(sniff(b"<!DOCTYPE html><html>"), "text/html");
        assert_eq!(sniff(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff(b"plain words"), "text/plain");
        assert_eq!(sniff(b"\x00\x01\x02\xff"), "application/octet-stream");
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[tokio::test]
    async fn test_open_sniffs_unknown_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = std::fs::File::create(dir.path().join("page.qqq")).expect("create");
        file.write_all(b"<html><body>hi</body></html>").expect("write");

        let asset = open(dir.path(), "/page.qqq").await.expect("asset");
        assert_eq!(asset.content_type, "text/html");
        assert_eq!(asset.len, 28);
    }

    #[tokio::test]
    async fn test_open_skips_directories_and_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("css")).expect("mkdir");

        assert!(open(dir.path(), "/css").await.is_none());
        assert!(open(dir.path(), "/missing.js").await.is_none());
    }
}
