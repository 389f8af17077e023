//! Auth configuration surface
//!
//! [`AuthConfig`] is the read-only key/value view of tap or stream
//! configuration that the authenticator selector consumes. It is assumed to
//! be validated upstream; accessors here only coerce shapes.

use crate::error::{Error, Result, ResultExt};
use crate::types::{scalar_to_string, JsonObject, JsonValue, OptionStringExt, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Immutable key/value configuration handed to the selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthConfig {
    values: JsonObject,
}

impl AuthConfig {
    /// Wrap an already-parsed JSON object
    pub fn new(values: JsonObject) -> Self {
        Self { values }
    }

    /// Build from any JSON value; only objects are accepted
    pub fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            JsonValue::Null => Ok(Self::default()),
            other => Err(Error::config(format!(
                "Configuration must be a JSON object, got: {other}"
            ))),
        }
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    /// Load configuration from a file; `.yaml`/`.yml` files are read as YAML,
    /// anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Pick the configuration in effect: the stream-level one when present
    /// and non-empty, otherwise the top-level tap configuration.
    pub fn resolve(stream: Option<&AuthConfig>, tap: &AuthConfig) -> AuthConfig {
        match stream {
            Some(stream) if !stream.is_empty() => stream.clone(),
            _ => tap.clone(),
        }
    }

    /// Whether no keys are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the key is present (even if null or empty)
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Raw JSON value for a key
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Scalar value rendered as a string (numbers and booleans stringified)
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(scalar_to_string)
    }

    /// Like [`get_string`](Self::get_string), but empty strings count as absent
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_string(key).none_if_empty()
    }

    /// String value, defaulting to the empty string
    pub fn get_string_or_empty(&self, key: &str) -> String {
        self.get_string(key).unwrap_or_default()
    }

    /// Boolean value; accepts JSON booleans and "true"/"false"/"1"/"0" strings
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(Error::invalid_value(key, format!("expected a boolean, got '{s}'"))),
            },
            Some(other) => Err(Error::invalid_value(
                key,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    /// Unsigned integer value; accepts JSON numbers and numeric strings
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                Error::invalid_value(key, format!("expected a non-negative integer, got {n}"))
            }),
            Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
            Some(JsonValue::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                Error::invalid_value(key, format!("expected a non-negative integer, got '{s}'"))
            }),
            Some(other) => Err(Error::invalid_value(
                key,
                format!("expected a non-negative integer, got {other}"),
            )),
        }
    }

    /// Object of scalars flattened into a string map
    pub fn get_string_map(&self, key: &str) -> Result<StringMap> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(StringMap::new()),
            Some(JsonValue::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    scalar_to_string(v)
                        .map(|v| (k.clone(), v))
                        .ok_or_else(|| {
                            Error::invalid_value(key, format!("entry '{k}' must be a scalar"))
                        })
                })
                .collect(),
            Some(other) => Err(Error::invalid_value(
                key,
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// Nested object as its own configuration
    pub fn get_object(&self, key: &str) -> Option<AuthConfig> {
        match self.values.get(key) {
            Some(JsonValue::Object(map)) => Some(AuthConfig::new(map.clone())),
            _ => None,
        }
    }

    /// Configured `auth_method`, or an empty string when unset
    pub fn auth_method(&self) -> String {
        self.get_string_or_empty("auth_method")
    }

    /// The AWS sub-configuration: the nested `aws_credentials` object when
    /// present, otherwise the configuration itself
    pub fn aws_section(&self) -> AuthConfig {
        self.get_object("aws_credentials")
            .unwrap_or_else(|| self.clone())
    }

    /// Iterate over keys and values
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }
}

impl From<JsonObject> for AuthConfig {
    fn from(values: JsonObject) -> Self {
        Self::new(values)
    }
}

impl TryFrom<JsonValue> for AuthConfig {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        Self::from_value(value)
    }
}
