//! Real credentials for a fixture, loaded once per run and never persisted.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::HarnessError;

/// Secret values keyed by name, possibly nested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secrets {
    values: Map<String, Value>,
}

impl Secrets {
    /// Wraps an already-parsed JSON object.
    #[must_use]
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Loads secrets from a JSON object file.
    ///
    /// A missing file yields empty secrets, which is the normal case for
    /// replay on a machine without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SecretsLoad`] if the file exists but cannot be
    /// read or is not a JSON object.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        if !path.is_file() {
            debug!(path = %path.display(), "no secrets file");
            return Ok(Self::default());
        }
        let load_err = |reason: String| HarnessError::SecretsLoad { path: path.to_path_buf(), reason };
        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        match serde_json::from_str::<Value>(&content).map_err(|e| load_err(e.to_string()))? {
            Value::Object(values) => Ok(Self { values }),
            other => Err(load_err(format!("expected a JSON object, found {}", kind(&other)))),
        }
    }

    /// Returns `true` if no secrets are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up a key; dots descend into nested objects (`oauth.client_secret`).
    ///
    /// An exact top-level key wins over a dotted path.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let first = self.values.get(parts.next()?)?;
        parts.try_fold(first, |value, part| value.get(part))
    }

    /// Every non-empty string value, recursively, including values inside
    /// JSON documents stored as strings. Deduplicated, longest first.
    #[must_use]
    pub fn redaction_values(&self) -> Vec<String> {
        let mut out = Vec::new();
        for value in self.values.values() {
            collect_strings(value, &mut out);
        }
        out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        out.dedup();
        out
    }

    /// Deep-merges the secrets over `config`: objects merge key by key,
    /// anything else is replaced by the secret value.
    pub fn merge_into(&self, config: &mut Value) {
        if !config.is_object() {
            *config = Value::Object(Map::new());
        }
        for (key, value) in &self.values {
            if let Value::Object(target) = config {
                merge_value(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn merge_value(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                merge_value(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, source) => *target = source.clone(),
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => {
            out.push(s.clone());
            if let Ok(inner @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(s) {
                collect_strings(&inner, out);
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
