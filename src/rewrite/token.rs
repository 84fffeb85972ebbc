//! Rewrite token codec.
//!
//! A proxied URL carries its original origin as a reserved query parameter:
//!
//! ```text
//! http://app.test:8000/posts?page=2
//!   -> http://127.0.0.1:41234/posts?page=2&__origin=WyJodHRwIiwiYXBwLnRlc3QiLDgwMDBd
//! ```
//!
//! The value is URL-safe base64 (no padding) of the JSON array
//! `[scheme, host, port]`, where `port` is `null` for the scheme default.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Reserved query-string key holding the encoded origin.
pub const TOKEN_KEY: &str = "__origin";

/// URL-safe base64 that writes no padding and accepts it either way.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// Origin
// ============================================================================

/// Scheme, host and port of the destination a proxied URL really points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// URL scheme, e.g. `https`.
    pub scheme: String,
    /// Host name or address literal.
    pub host: String,
    /// Explicit port, `None` for the scheme default.
    pub port: Option<u16>,
}

impl Origin {
    /// Extracts the origin of an absolute URL.
    ///
    /// Returns `None` for URLs without a host.
    #[must_use]
    pub fn of(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_string(),
            port: url.port(),
        })
    }

    /// Encodes the origin as a token value.
    #[must_use]
    pub fn encode(&self) -> String {
        let triple = (&self.scheme, &self.host, self.port);
        // A tuple of strings and an optional integer always serializes.
        let json = serde_json::to_vec(&triple).unwrap_or_default();
        TOKEN_ENGINE.encode(json)
    }

    /// Decodes a token value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the value is not base64 of a
    /// `[scheme, host, port]` array.
    pub fn decode(token: &str) -> Result<Self> {
        let json = TOKEN_ENGINE
            .decode(token.trim())
            .map_err(|e| Error::invalid_token(format!("not base64: {e}")))?;

        let (scheme, host, port): (String, String, Option<u16>) = serde_json::from_slice(&json)
            .map_err(|e| Error::invalid_token(format!("not an origin triple: {e}")))?;

        if scheme.is_empty() || host.is_empty() {
            return Err(Error::invalid_token("empty scheme or host"));
        }

        Ok(Self { scheme, host, port })
    }

    /// Applies this origin to `url`, replacing its scheme, host and port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the URL rejects the components.
    pub fn apply_to(&self, url: &mut Url) -> Result<()> {
        url.set_scheme(&self.scheme)
            .map_err(|()| Error::invalid_token(format!("unusable scheme {}", self.scheme)))?;
        url.set_host(Some(&self.host))
            .map_err(|e| Error::invalid_token(format!("unusable host {}: {e}", self.host)))?;
        url.set_port(self.port)
            .map_err(|()| Error::invalid_token("port not allowed for scheme"))?;
        Ok(())
    }
}

// ============================================================================
// Query Helpers
// ============================================================================

/// Splits the token out of a raw query string.
///
/// Returns the token value (if any) and the remaining query with every
/// other pair kept verbatim and in order. The remaining query is `None`
/// only when the token was the sole pair; an empty pair next to the token
/// stands for an empty original query and comes back as `Some("")`.
#[must_use]
pub fn strip_token(query: &str) -> (Option<String>, Option<String>) {
    let mut token = None;
    let mut rest = Vec::new();

    for pair in query.split('&') {
        match pair.split_once('=') {
            Some((TOKEN_KEY, value)) => {
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                token = Some(value);
            }
            None if pair == TOKEN_KEY => token = Some(String::new()),
            _ => rest.push(pair),
        }
    }

    let rest = (!rest.is_empty()).then(|| rest.join("&"));
    (token, rest)
}

/// Appends the token for `origin` to an existing query string.
///
/// A present but empty query keeps a leading empty pair so that the
/// trailing `?` survives the round trip.
#[must_use]
pub fn append_token(query: Option<&str>, origin: &Origin) -> String {
    match query {
        Some(existing) => format!("{existing}&{TOKEN_KEY}={}", origin.encode()),
        None => format!("{TOKEN_KEY}={}", origin.encode()),
    }
}

// ============================================================================
// URL Rewriting
// ============================================================================

/// Rewrites `url` to point at `proxy` if its host is `app_host`.
///
/// URLs that do not parse as absolute URLs, and URLs for any other host,
/// come back unchanged.
#[must_use]
pub fn rewrite(url: &str, app_host: &str, proxy: &Url) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let Some(origin) = Origin::of(&parsed) else {
        return url.to_string();
    };

    if !origin.host.eq_ignore_ascii_case(app_host) {
        return url.to_string();
    }

    let query = append_token(parsed.query(), &origin);

    let target = Origin {
        scheme: proxy.scheme().to_string(),
        host: proxy.host_str().unwrap_or("127.0.0.1").to_string(),
        port: proxy.port_or_known_default(),
    };

    if target.apply_to(&mut parsed).is_err() {
        return url.to_string();
    }
    parsed.set_query(Some(&query));

    parsed.into()
}

/// Restores the original URL from a rewritten one.
///
/// URLs without a token are returned as they are.
///
/// # Errors
///
/// - [`Error::Config`] if `url` is not an absolute URL
/// - [`Error::InvalidToken`] if the token cannot be decoded
pub fn unrewrite(url: &str) -> Result<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| Error::config(format!("not an absolute URL {url}: {e}")))?;

    let Some(query) = parsed.query().map(str::to_string) else {
        return Ok(url.to_string());
    };

    let (token, rest) = strip_token(&query);
    let Some(token) = token else {
        return Ok(url.to_string());
    };

    Origin::decode(&token)?.apply_to(&mut parsed)?;
    parsed.set_query(rest.as_deref());

    Ok(parsed.into())
}

// ============================================================================
// Tests
// ============================================================================
