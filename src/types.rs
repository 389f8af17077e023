//! Common types used throughout rest-tap-auth
//!
//! Shared type aliases and small utility traits used across modules.

use std::collections::HashMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Utilities
// ============================================================================

/// Treats an empty config or environment value the same as an unset one
pub trait OptionStringExt {
    /// `None` for both `None` and `Some("")`
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

/// Render a JSON scalar as the string a config consumer expects.
///
/// Strings are returned as-is, numbers and booleans are stringified,
/// everything else yields `None`.
pub fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
