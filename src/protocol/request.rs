//! Outbound request preparation.
//!
//! Turns a [`WebDriverCommand`] into the method, URL, headers and body of
//! exactly one HTTP request.
//!
//! # Format
//!
//! ```text
//! POST {base}/session/{sessionId}/element/{id}/value
//! Accept: application/json
//! Content-Type: application/json;charset=UTF-8
//!
//! {"text":"hello"}
//! ```

// ============================================================================
// Imports
// ============================================================================

use http::Method;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::command::{URL_PARAM_PREFIX, WebDriverCommand};

// ============================================================================
// Constants
// ============================================================================

/// `Accept` header sent with every command.
pub const ACCEPT_JSON: &str = "application/json";

/// `Content-Type` header sent with POST bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";

// ============================================================================
// PreparedRequest
// ============================================================================

/// A command ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method (GET, POST or DELETE).
    pub method: Method,

    /// Absolute request URL.
    pub url: String,

    /// Default headers for the method.
    pub headers: Vec<(&'static str, &'static str)>,

    /// JSON object body; `Some` exactly for POST.
    pub body: Option<String>,
}

impl PreparedRequest {
    /// Prepares `command` against the endpoint at `base_url`.
    ///
    /// URL parameters (and the session id) fill the path template, longest
    /// placeholder first so `:id` never clobbers `:idx`. Remaining parameters
    /// form the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if body fields are paired with a
    /// method other than POST, or a placeholder has no value.
    pub fn from_command(base_url: &str, command: &WebDriverCommand) -> Result<Self> {
        let (method, template) = command.name.endpoint();

        let mut url_params: Vec<(String, String)> = Vec::new();
        let mut body = Map::new();

        for (key, value) in &command.parameters {
            if WebDriverCommand::is_url_param(key) {
                url_params.push((key.clone(), url_param_value(value)));
            } else {
                body.insert(key.clone(), value.clone());
            }
        }

        if let Some(session_id) = &command.session_id {
            url_params.retain(|(key, _)| key != ":sessionId");
            url_params.push((":sessionId".to_string(), session_id.as_str().to_string()));
        }

        if !body.is_empty() && method != Method::POST {
            return Err(Error::invalid_command(
                command.name.as_str(),
                format!(
                    "{method} {template} cannot carry body fields: {}",
                    Value::Object(body)
                ),
            ));
        }

        let path = interpolate(template, url_params);

        if let Some(missing) = path
            .split('/')
            .find(|segment| segment.starts_with(URL_PARAM_PREFIX))
        {
            return Err(Error::invalid_command(
                command.name.as_str(),
                format!("no value for {missing} in {template}"),
            ));
        }

        let body = if method == Method::POST {
            Some(encode_payload(&body)?)
        } else {
            None
        };

        Ok(Self {
            url: format!("{}{path}", base_url.trim_end_matches('/')),
            headers: default_headers(&method),
            method,
            body,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Serializes body fields as a JSON object; empty fields give `{}`.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_payload(fields: &Map<String, Value>) -> Result<String> {
    Ok(serde_json::to_string(fields)?)
}

/// Headers sent for the given method.
#[must_use]
pub fn default_headers(method: &Method) -> Vec<(&'static str, &'static str)> {
    let mut headers = vec![("Accept", ACCEPT_JSON)];
    if *method == Method::POST {
        headers.push(("Content-Type", CONTENT_TYPE_JSON));
    }
    headers
}

fn interpolate(template: &str, mut params: Vec<(String, String)>) -> String {
    params.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    params
        .into_iter()
        .fold(template.to_string(), |path, (placeholder, value)| {
            path.replace(&placeholder, &urlencoding::encode(&value))
        })
}

fn url_param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
