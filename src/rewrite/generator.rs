//! Link generation decorator.
//!
//! [`ProxiedUrlGenerator`] wraps the application's own [`UrlGenerator`] and
//! sends every absolute link for the application host through the proxy
//! listener instead.

// ============================================================================
// Imports
// ============================================================================

use std::time::SystemTime;

use tracing::trace;
use url::Url;

use crate::server::KernelError;

use super::token::rewrite;

// ============================================================================
// Types
// ============================================================================

/// Route or query parameters as ordered key/value pairs.
pub type Parameters<'a> = &'a [(&'a str, &'a str)];

/// Result of a URL-producing call.
pub type UrlResult = std::result::Result<String, KernelError>;

// ============================================================================
// UrlGenerator
// ============================================================================

/// The application's link-generation facility.
///
/// Every operation that yields a URL returns it as a string; the decorator
/// post-processes exactly those.
pub trait UrlGenerator: Send + Sync {
    /// URL of the request currently being handled.
    fn current(&self) -> UrlResult;

    /// URL of the previous request, or `fallback`.
    fn previous(&self, fallback: Option<&str>) -> UrlResult;

    /// Absolute URL for a path.
    fn to(&self, path: &str, extra: &[&str], secure: Option<bool>) -> UrlResult;

    /// Absolute HTTPS URL for a path.
    fn secure(&self, path: &str, parameters: &[&str]) -> UrlResult;

    /// URL of a public asset.
    fn asset(&self, path: &str, secure: Option<bool>) -> UrlResult;

    /// HTTPS URL of a public asset.
    fn secure_asset(&self, path: &str) -> UrlResult {
        self.asset(path, Some(true))
    }

    /// URL of a named route.
    fn route(&self, name: &str, parameters: Parameters<'_>, absolute: bool) -> UrlResult;

    /// Signed URL of a named route.
    fn signed_route(
        &self,
        name: &str,
        parameters: Parameters<'_>,
        expiration: Option<SystemTime>,
        absolute: bool,
    ) -> UrlResult;

    /// Signed URL of a named route that stops validating at `expiration`.
    fn temporary_signed_route(
        &self,
        name: &str,
        expiration: SystemTime,
        parameters: Parameters<'_>,
        absolute: bool,
    ) -> UrlResult {
        self.signed_route(name, parameters, Some(expiration), absolute)
    }

    /// URL of a controller action.
    fn action(&self, action: &str, parameters: Parameters<'_>, absolute: bool) -> UrlResult;

    /// Absolute URL for a path with a query string merged in.
    fn query(
        &self,
        path: &str,
        query: Parameters<'_>,
        extra: &[&str],
        secure: Option<bool>,
    ) -> UrlResult;

    /// Namespace prefixed to controller actions.
    fn root_controller_namespace(&self) -> Option<String>;

    /// Sets the namespace prefixed to controller actions.
    fn set_root_controller_namespace(&mut self, namespace: &str);
}

// ============================================================================
// ProxiedUrlGenerator
// ============================================================================

/// Decorator that routes application links through the proxy listener.
///
/// # Example
///
/// ```ignore
/// let proxy_url = server.url()?;
/// let urls = ProxiedUrlGenerator::new(proxy_url, "app.test", app_urls);
///
/// // "http://app.test/login" becomes "http://127.0.0.1:41234/login?__origin=..."
/// let login = urls.route("login", &[], true)?;
/// ```
#[derive(Debug, Clone)]
pub struct ProxiedUrlGenerator<G> {
    /// Published address of the proxy listener.
    endpoint: Url,
    /// Host the application considers its own.
    app_host: String,
    /// Wrapped generator.
    inner: G,
}

impl<G: UrlGenerator> ProxiedUrlGenerator<G> {
    /// Wraps `inner`, rewriting links for `app_host` to `endpoint`.
    #[must_use]
    pub fn new(endpoint: Url, app_host: impl Into<String>, inner: G) -> Self {
        Self {
            endpoint,
            app_host: app_host.into().to_ascii_lowercase(),
            inner,
        }
    }

    /// Rewrites a single URL.
    ///
    /// Links for other hosts, relative paths and non-URL strings are
    /// returned unchanged.
    #[must_use]
    pub fn proxy(&self, url: &str) -> String {
        let proxied = rewrite(url, &self.app_host, &self.endpoint);
        if proxied != url {
            trace!(from = %url, to = %proxied, "Rewrote application URL");
        }
        proxied
    }

    /// Returns the wrapped generator.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Returns the proxy endpoint links are rewritten to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the application host.
    #[inline]
    #[must_use]
    pub fn app_host(&self) -> &str {
        &self.app_host
    }

    fn forward(&self, result: UrlResult) -> UrlResult {
        result.map(|url| self.proxy(&url))
    }
}

impl<G: UrlGenerator> UrlGenerator for ProxiedUrlGenerator<G> {
    fn current(&self) -> UrlResult {
        self.forward(self.inner.current())
    }

    fn previous(&self, fallback: Option<&str>) -> UrlResult {
        self.forward(self.inner.previous(fallback))
    }

    fn to(&self, path: &str, extra: &[&str], secure: Option<bool>) -> UrlResult {
        self.forward(self.inner.to(path, extra, secure))
    }

    fn secure(&self, path: &str, parameters: &[&str]) -> UrlResult {
        self.forward(self.inner.secure(path, parameters))
    }

    fn asset(&self, path: &str, secure: Option<bool>) -> UrlResult {
        self.forward(self.inner.asset(path, secure))
    }

    fn secure_asset(&self, path: &str) -> UrlResult {
        self.forward(self.inner.secure_asset(path))
    }

    fn route(&self, name: &str, parameters: Parameters<'_>, absolute: bool) -> UrlResult {
        self.forward(self.inner.route(name, parameters, absolute))
    }

    fn signed_route(
        &self,
        name: &str,
        parameters: Parameters<'_>,
        expiration: Option<SystemTime>,
        absolute: bool,
    ) -> UrlResult {
        self.forward(
            self.inner
                .signed_route(name, parameters, expiration, absolute),
        )
    }

    fn temporary_signed_route(
        &self,
        name: &str,
        expiration: SystemTime,
        parameters: Parameters<'_>,
        absolute: bool,
    ) -> UrlResult {
        self.forward(
            self.inner
                .temporary_signed_route(name, expiration, parameters, absolute),
        )
    }

    fn action(&self, action: &str, parameters: Parameters<'_>, absolute: bool) -> UrlResult {
        self.forward(self.inner.action(action, parameters, absolute))
    }

    fn query(
        &self,
        path: &str,
        query: Parameters<'_>,
        extra: &[&str],
        secure: Option<bool>,
    ) -> UrlResult {
        self.forward(self.inner.query(path, query, extra, secure))
    }

    fn root_controller_namespace(&self) -> Option<String> {
        self.inner.root_controller_namespace()
    }

    fn set_root_controller_namespace(&mut self, namespace: &str) {
        self.inner.set_root_controller_namespace(namespace);
    }
}

// ============================================================================
// Tests
// ============================================================================
