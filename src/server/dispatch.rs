//! Request pipeline.
//!
//! Every request accepted by the listener runs through [`handle`]:
//!
//! 1. Wait for an admission permit (concurrency cap)
//! 2. Serve static assets straight from disk
//! 3. Buffer the body, enforcing the size cap
//! 4. Restore the original origin from the rewrite token
//! 5. Call the kernel, map its response, run `terminate`
//!
//! Failures in steps 4–5 (errors and panics alike) become a plaintext 500.
//! Exactly one response is produced per request.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, SET_COOKIE};
use http::request::Parts;
use http::{HeaderValue, Request, Response, StatusCode, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Frame, Incoming, SizeHint};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::Error;
use crate::rewrite::token::{Origin, strip_token};

use super::assets;
use super::in_flight::InFlightGuard;
use super::kernel::{AppRequest, AppResponse, Kernel};
use super::listener::ServerState;

// ============================================================================
// Types
// ============================================================================

/// Response body type produced by the proxy.
pub type ProxyBody = UnsyncBoxBody<Bytes, std::io::Error>;

// ============================================================================
// Pipeline
// ============================================================================

/// Runs one request through the pipeline.
///
/// Never fails: every outcome, including kernel failures, is a response.
pub(crate) async fn handle(
    state: Arc<ServerState>,
    peer: SocketAddr,
    local_addr: SocketAddr,
    request: Request<Incoming>,
) -> Result<Response<ProxyBody>, Infallible> {
    let Ok(_permit) = state.admission.acquire().await else {
        return Ok(text_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Proxy server is shutting down",
        ));
    };

    let guard = state.in_flight.enter();

    trace!(method = %request.method(), uri = %request.uri(), %peer, "Request admitted");

    if let Some(root) = state.config.public_root.as_deref()
        && let Some(asset) = assets::open(root, request.uri().path()).await
    {
        return Ok(assets::response(asset, guard));
    }

    let max_body = state.config.max_body_bytes;

    if let Some(length) = content_length(&request)
        && length > max_body as u64
    {
        debug!(length, max_body, "Request body exceeds limit");
        return Ok(payload_too_large(max_body));
    }

    let (parts, body) = request.into_parts();

    let body = match Limited::new(body, max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!(max_body, "Request body exceeded limit while buffering");
            return Ok(payload_too_large(max_body));
        }
        Err(e) => {
            warn!(error = %e, %peer, "Failed to read request body");
            return Ok(body_read_failed(&*e));
        }
    };

    let response = dispatch(state.kernel.as_ref(), &parts, body, peer, local_addr);

    Ok(hold_until_sent(response, guard))
}

/// Keeps the request in flight until hyper has consumed the response body.
fn hold_until_sent(response: Response<ProxyBody>, guard: InFlightGuard) -> Response<ProxyBody> {
    response.map(|body| {
        TrackedBody {
            inner: body,
            _in_flight: guard,
        }
        .boxed_unsync()
    })
}

// ============================================================================
// TrackedBody
// ============================================================================

/// Response body that holds an in-flight guard until it is dropped.
///
/// Length and end-of-stream hints pass through untouched, so fully
/// materialized bodies still go out with `Content-Length`.
struct TrackedBody {
    inner: ProxyBody,
    _in_flight: InFlightGuard,
}

impl Body for TrackedBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Hands a buffered request to the kernel and maps the outcome.
///
/// The kernel call is synchronous and runs to completion without yielding
/// to the loop.
pub(crate) fn dispatch(
    kernel: &dyn Kernel,
    parts: &Parts,
    body: Bytes,
    peer: SocketAddr,
    local_addr: SocketAddr,
) -> Response<ProxyBody> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let request =
            app_request(parts, body, peer, local_addr).map_err(|e| Failure::from_error(&e))?;

        let response = kernel
            .handle(&request)
            .map_err(|e| Failure::from_error(&*e))?;

        let wire = wire_response(&response)?;
        kernel.terminate(&request, &response);

        trace!(status = %response.status, url = %request.url, "Kernel responded");
        Ok::<_, Failure>(wire)
    }));

    let failure = match outcome {
        Ok(Ok(response)) => return response,
        Ok(Err(failure)) => failure,
        Err(payload) => Failure::from_panic(payload.as_ref()),
    };

    error!(
        method = %parts.method,
        uri = %parts.uri,
        error = %failure.message,
        "Application request failed"
    );

    failure.into_response(&parts.method, &parts.uri)
}

// ============================================================================
// Request Translation
// ============================================================================

/// Builds the kernel's view of a request.
///
/// A rewrite token in the query restores the original scheme, host and
/// port; the token itself never reaches the application.
pub(crate) fn app_request(
    parts: &Parts,
    body: Bytes,
    peer: SocketAddr,
    local_addr: SocketAddr,
) -> crate::error::Result<AppRequest> {
    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .map_or_else(|| local_addr.to_string(), str::to_string);

    let mut url = Url::parse(&format!("http://{host}{}", parts.uri.path()))
        .map_err(|e| Error::config(format!("unusable request target {}: {e}", parts.uri)))?;

    match parts.uri.query() {
        Some(query) => {
            let (token, rest) = strip_token(query);
            match token {
                Some(token) => {
                    Origin::decode(&token)?.apply_to(&mut url)?;
                    url.set_query(rest.as_deref());
                }
                None => url.set_query(Some(query)),
            }
        }
        None => url.set_query(None),
    }

    Ok(AppRequest {
        method: parts.method.clone(),
        url,
        headers: parts.headers.clone(),
        body,
        peer: Some(peer),
    })
}

// ============================================================================
// Response Translation
// ============================================================================

/// Maps a kernel response onto the wire.
///
/// Cookies are unpacked into one `Set-Cookie` header each; when the kernel
/// reports cookies they replace any `Set-Cookie` entries in its headers.
fn wire_response(response: &AppResponse) -> Result<Response<ProxyBody>, Failure> {
    let mut wire = Response::new(full(response.body.clone()));
    *wire.status_mut() = response.status;

    if response.version == Version::HTTP_10 {
        *wire.version_mut() = Version::HTTP_10;
    }

    let headers = wire.headers_mut();
    let replace_cookies = !response.cookies.is_empty();

    for (name, value) in &response.headers {
        if replace_cookies && *name == SET_COOKIE {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    for cookie in &response.cookies {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| Failure::new(format!("Invalid cookie {cookie:?}: {e}"), String::new()))?;
        headers.append(SET_COOKIE, value);
    }

    Ok(wire)
}

/// Wraps fully materialized bytes as a proxy body.
pub(crate) fn full(body: impl Into<Bytes>) -> ProxyBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Builds a plaintext response.
pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> Response<ProxyBody> {
    let mut response = Response::new(full(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn payload_too_large(max_body: usize) -> Response<ProxyBody> {
    text_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Request body exceeds {max_body} bytes"),
    )
}

/// Answers a request whose body could not be read off the connection.
fn body_read_failed(err: &(dyn StdError + 'static)) -> Response<ProxyBody> {
    text_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to read request body: {err}"),
    )
}

fn content_length(request: &Request<Incoming>) -> Option<u64> {
    request
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

// ============================================================================
// Failure
// ============================================================================

/// A failure caught at the pipeline boundary.
#[derive(Debug)]
struct Failure {
    /// Primary message.
    message: String,
    /// Cause chain or panic note.
    trace: String,
}

impl Failure {
    fn new(message: String, trace: String) -> Self {
        Self { message, trace }
    }

    fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut trace = String::new();
        let mut source = err.source();
        let mut depth = 0;

        while let Some(cause) = source {
            let _ = writeln!(trace, "#{depth} caused by: {cause}");
            source = cause.source();
            depth += 1;
        }

        Self::new(err.to_string(), trace)
    }

    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "kernel panicked".to_string());

        Self::new(message, "#0 panicked inside the application kernel\n".to_string())
    }

    fn into_response(self, method: &http::Method, uri: &http::Uri) -> Response<ProxyBody> {
        let mut body = self.message;
        body.push('\n');
        body.push_str(&self.trace);
        let _ = writeln!(body, "#- while handling {method} {uri}");

        text_response(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use http::Method;

    use crate::rewrite::token::TOKEN_KEY;
    use crate::server::KernelError;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn parts(uri: &str, host: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        builder.body(()).expect("request").into_parts().0
    }

    async fn body_text(response: Response<ProxyBody>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[test]
    fn test_app_request_without_token_uses_host_header() {
        let parts = parts("/posts?page=2", Some("127.0.0.1:9000"));
        let request = app_request(&parts, Bytes::new(), addr(5000), addr(9000)).expect("request");

        assert_eq!(request.url.as_str(), "http://127.0.0.1:9000/posts?page=2");
    }

    #[test]
    fn test_app_request_restores_origin() {
        let origin = Origin {
            scheme: "https".into(),
            host: "app.test".into(),
            port: Some(8443),
        };
        let uri = format!("/posts?page=2&{TOKEN_KEY}={}", origin.encode());
        let parts = parts(&uri, Some("127.0.0.1:9000"));

        let request = app_request(&parts, Bytes::new(), addr(5000), addr(9000)).expect("request");

        assert_eq!(request.url.as_str(), "https://app.test:8443/posts?page=2");
        assert_eq!(request.query(), Some("page=2"));
    }

    #[test]
    fn test_app_request_token_only_query() {
        let origin = Origin {
            scheme: "http".into(),
            host: "app.test".into(),
            port: None,
        };
        let uri = format!("/?{TOKEN_KEY}={}", origin.encode());
        let parts = parts(&uri, None);

        let request = app_request(&parts, Bytes::new(), addr(5000), addr(9000)).expect("request");
        assert_eq!(request.url.as_str(), "http://app.test/");
    }

    #[test]
    fn test_app_request_keeps_empty_query() {
        let origin = Origin {
            scheme: "http".into(),
            host: "app.test".into(),
            port: None,
        };
        let uri = format!("/search?&{TOKEN_KEY}={}", origin.encode());
        let parts = parts(&uri, None);

        let request = app_request(&parts, Bytes::new(), addr(5000), addr(9000)).expect("request");
        assert_eq!(request.url.as_str(), "http://app.test/search?");
        assert_eq!(request.query(), Some(""));
    }

    #[test]
    fn test_app_request_rejects_bad_token() {
        let parts = parts(&format!("/?{TOKEN_KEY}=@@@"), None);
        let result = app_request(&parts, Bytes::new(), addr(5000), addr(9000));
        assert!(matches!(result, Err(Error::InvalidToken { .. })));
    }

    #[tokio::test]
    async fn test_dispatch_unpacks_cookies() {
        let kernel = |_: &AppRequest| -> Result<AppResponse, KernelError> {
            Ok(AppResponse::ok("hi")
                .with_header("Set-Cookie", "stale=1")
                .with_header("X-Frame-Options", "DENY")
                .with_cookie("a=1; Path=/")
                .with_cookie("b=2; Path=/"))
        };

        let response = dispatch(&kernel, &parts("/", None), Bytes::new(), addr(1), addr(2));

        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().expect("ascii").to_string())
            .collect();
        assert_eq!(cookies, vec!["a=1; Path=/", "b=2; Path=/"]);
        assert_eq!(response.headers().get("x-frame-options").expect("header"), "DENY");
        assert_eq!(body_text(response).await, "hi");
    }

    #[tokio::test]
    async fn test_dispatch_error_becomes_500() {
        let kernel = |_: &AppRequest| -> Result<AppResponse, KernelError> {
            let cause = std::io::Error::other("database unreachable");
            Err(Box::new(Error::Io(cause)))
        };

        let response = dispatch(&kernel, &parts("/boom", None), Bytes::new(), addr(1), addr(2));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.starts_with("IO error: database unreachable\n"));
        assert!(body.contains("GET /boom"));
    }

    #[tokio::test]
    async fn test_held_response_keeps_length_and_guard() {
        use crate::server::in_flight::InFlight;

        let in_flight = InFlight::default();
        let response = hold_until_sent(
            text_response(StatusCode::NOT_FOUND, "Not Found"),
            in_flight.enter(),
        );

        assert_eq!(response.body().size_hint().exact(), Some(9));
        assert!(!response.body().is_end_stream());
        assert_eq!(in_flight.count(), 1);

        assert_eq!(body_text(response).await, "Not Found");
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_a_server_error() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");

        let response = body_read_failed(&cause);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).expect("content type"),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "Failed to read request body: peer reset");
    }

    #[tokio::test]
    async fn test_dispatch_panic_becomes_500() {
        let kernel = |_: &AppRequest| -> Result<AppResponse, KernelError> {
            panic!("view not found");
        };

        let response = dispatch(&kernel, &parts("/", None), Bytes::new(), addr(1), addr(2));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.starts_with("view not found\n"));
    }

    #[test]
    fn test_dispatch_runs_terminate_after_handle() {
        use parking_lot::Mutex;

        #[derive(Default)]
        struct Recording {
            calls: Mutex<Vec<String>>,
        }

        impl Kernel for Recording {
            fn handle(&self, request: &AppRequest) -> Result<AppResponse, KernelError> {
                self.calls.lock().push(format!("handle {}", request.path()));
                Ok(AppResponse::not_found())
            }

            fn terminate(&self, request: &AppRequest, response: &AppResponse) {
                self.calls
                    .lock()
                    .push(format!("terminate {} {}", request.path(), response.status.as_u16()));
            }
        }

        let kernel = Recording::default();
        let response = dispatch(&kernel, &parts("/x", None), Bytes::new(), addr(1), addr(2));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            *kernel.calls.lock(),
            vec!["handle /x".to_string(), "terminate /x 404".to_string()]
        );
    }
}
