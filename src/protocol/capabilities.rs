//! Session capabilities.
//!
//! Capabilities are an opaque JSON map. The only interpretation done here is
//! translating between legacy names and their W3C equivalents.
//!
//! | Legacy | W3C |
//! |--------|-----|
//! | `platform` | `platformName` (lowercased, `ANY` dropped) |
//! | `version` | `browserVersion` |
//! | `acceptSslCerts` | `acceptInsecureCerts` |
//! | `chromeOptions` | `goog:chromeOptions` |
//! | `firefox_profile` | `moz:firefoxOptions.profile` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Constants
// ============================================================================

/// Capability names defined by the W3C specification.
const W3C_KEYS: &[&str] = &[
    "browserName",
    "browserVersion",
    "platformName",
    "acceptInsecureCerts",
    "pageLoadStrategy",
    "proxy",
    "setWindowRect",
    "timeouts",
    "strictFileInteractability",
    "unhandledPromptBehavior",
    "webSocketUrl",
];

/// Legacy name and W3C name pairs with a plain rename.
const RENAMES: &[(&str, &str)] = &[
    ("platform", "platformName"),
    ("version", "browserVersion"),
    ("acceptSslCerts", "acceptInsecureCerts"),
];

// ============================================================================
// Capabilities
// ============================================================================

/// Opaque capability map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    /// Creates an empty capability set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a capability, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder form of [`set`](Self::set).
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns a capability value.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the browser name, if set.
    #[inline]
    #[must_use]
    pub fn browser_name(&self) -> Option<&str> {
        self.get("browserName").and_then(Value::as_str)
    }

    /// Returns `true` if no capability is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the capabilities as a JSON object.
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Capabilities {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Dialect Translation
// ============================================================================

impl Capabilities {
    /// Returns the capabilities a W3C endpoint accepts.
    ///
    /// Legacy names are renamed, vendor-prefixed keys (`vendor:name`) are
    /// kept, and anything else unknown is dropped.
    #[must_use]
    pub fn to_w3c(&self) -> Map<String, Value> {
        let mut w3c = Map::new();

        for (key, value) in &self.0 {
            match key.as_str() {
                "platform" => {
                    if let Some(platform) = value.as_str()
                        && !platform.eq_ignore_ascii_case("any")
                    {
                        w3c.insert(
                            "platformName".to_string(),
                            Value::String(platform.to_ascii_lowercase()),
                        );
                    }
                }
                "version" => {
                    if value.as_str().is_some_and(|v| !v.is_empty()) {
                        w3c.insert("browserVersion".to_string(), value.clone());
                    }
                }
                "acceptSslCerts" => {
                    w3c.insert("acceptInsecureCerts".to_string(), value.clone());
                }
                "chromeOptions" => {
                    w3c.entry("goog:chromeOptions")
                        .or_insert_with(|| value.clone());
                }
                "firefox_profile" => {
                    let options = w3c
                        .entry("moz:firefoxOptions")
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(options) = options {
                        options
                            .entry("profile")
                            .or_insert_with(|| value.clone());
                    }
                }
                key if W3C_KEYS.contains(&key) || key.contains(':') => {
                    merge(&mut w3c, key, value);
                }
                _ => {}
            }
        }

        w3c
    }

    /// Builds capabilities from a W3C negotiation response.
    ///
    /// Every key is kept; legacy aliases are added for the renamed ones.
    #[must_use]
    pub fn from_w3c(w3c: &Map<String, Value>) -> Self {
        let mut map = w3c.clone();

        for &(legacy, modern) in RENAMES {
            if let Some(value) = w3c.get(modern) {
                map.entry(legacy).or_insert_with(|| value.clone());
            }
        }

        Self(map)
    }
}

/// Inserts `value`, merging object values into an existing object entry.
fn merge(target: &mut Map<String, Value>, key: &str, value: &Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.insert(k.clone(), v.clone());
            }
        }
        _ => {
            target.insert(key.to_string(), value.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
