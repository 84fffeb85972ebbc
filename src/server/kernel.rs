//! Application kernel contract.
//!
//! The proxy never interprets application requests itself. Each request that
//! is not a static asset is handed to a [`Kernel`] as an [`AppRequest`], and
//! the kernel answers synchronously with an [`AppResponse`].
//!
//! The kernel call runs on the event loop thread and does not yield, so it
//! must not perform blocking network IO of its own: every other connection
//! on the loop waits while `handle` runs.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};
use url::Url;

// ============================================================================
// Types
// ============================================================================

/// Error returned by a kernel.
pub type KernelError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Kernel
// ============================================================================

/// Synchronous application request handler.
///
/// Closures of the form `Fn(&AppRequest) -> Result<AppResponse, KernelError>`
/// implement this trait.
pub trait Kernel: Send + Sync + 'static {
    /// Handles a fully buffered request.
    ///
    /// # Errors
    ///
    /// Any error becomes a 500 response carrying its message.
    fn handle(&self, request: &AppRequest) -> Result<AppResponse, KernelError>;

    /// Runs after the response has been produced, in the same unit of work.
    fn terminate(&self, request: &AppRequest, response: &AppResponse) {
        let _ = (request, response);
    }
}

impl<F> Kernel for F
where
    F: Fn(&AppRequest) -> Result<AppResponse, KernelError> + Send + Sync + 'static,
{
    fn handle(&self, request: &AppRequest) -> Result<AppResponse, KernelError> {
        self(request)
    }
}

// ============================================================================
// AppRequest
// ============================================================================

/// Request as seen by the application.
///
/// `url` is absolute and carries the original origin when the request came
/// in through a rewritten link; the rewrite token is already stripped.
#[derive(Debug, Clone)]
pub struct AppRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Fully buffered request body.
    pub body: Bytes,
    /// Remote peer address.
    pub peer: Option<SocketAddr>,
}

impl AppRequest {
    /// Returns the request path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the application-visible query string.
    #[inline]
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

// ============================================================================
// AppResponse
// ============================================================================

/// Response produced by the application.
///
/// Cookies are kept apart from `headers`; each one is written as its own
/// `Set-Cookie` header on the wire.
#[derive(Debug, Clone)]
pub struct AppResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Serialized cookies, one `Set-Cookie` each.
    pub cookies: Vec<String>,
    /// Fully materialized body.
    pub body: Bytes,
    /// Protocol version.
    pub version: Version,
}

impl AppResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            version: Version::HTTP_11,
        }
    }

    /// Creates a `200 OK` response with a body.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// Creates a `404 Not Found` response.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND).with_body("Not Found")
    }

    /// Appends a header.
    ///
    /// Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Adds a serialized cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookies.push(cookie.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the protocol version.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
