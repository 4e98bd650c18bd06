//! Component configuration: loading and `{{env.*}}` / `{{secret.*}}`
//! placeholder resolution.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HarnessError;
use crate::sanitize::REDACTED;
use crate::secrets::Secrets;

/// Environment variables visible to placeholder resolution.
///
/// The process environment overlaid by an optional `.env` file; the process
/// environment itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot of the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self { vars: std::env::vars().collect() }
    }

    /// Builds an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    /// Process environment overlaid with `dotenv_path` when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] if the file exists but cannot be
    /// parsed.
    pub fn load(dotenv_path: &Path) -> Result<Self, HarnessError> {
        let mut env = Self::from_process();
        if !dotenv_path.is_file() {
            return Ok(env);
        }
        let settings_err =
            |reason: String| HarnessError::Settings { path: dotenv_path.to_path_buf(), reason };
        let iter = dotenvy::from_path_iter(dotenv_path).map_err(|e| settings_err(e.to_string()))?;
        for item in iter {
            let (key, value) = item.map_err(|e| settings_err(e.to_string()))?;
            env.vars.insert(key, value);
        }
        debug!(path = %dotenv_path.display(), "applied .env overlay");
        Ok(env)
    }

    /// Value of `name`, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// What to do with a `{{secret.*}}` placeholder that has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSecret {
    /// Fail with [`HarnessError::SecretsUnresolved`].
    Fail,
    /// Substitute the redaction marker. Used for replay, where the cassette
    /// already holds redacted values in place of the real ones.
    Redact,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*(env|secret)\.([A-Za-z0-9_.\-#]+)\s*\}\}")
            .unwrap_or_else(|e| panic!("static placeholder regex failed to compile: {e}"))
    })
}

/// Replaces every placeholder in every string inside `value`.
///
/// A string that is exactly one `{{secret.*}}` placeholder takes the
/// secret's JSON value as-is, so non-string secrets keep their type.
///
/// # Errors
///
/// Returns [`HarnessError::SecretsUnresolved`] naming the first placeholder
/// that has no value.
pub fn resolve_placeholders(
    value: &mut Value,
    env: &Environment,
    secrets: &Secrets,
    missing: MissingSecret,
) -> Result<(), HarnessError> {
    match value {
        Value::String(s) => {
            if let Some(resolved) = resolve_string(s, env, secrets, missing)? {
                *value = resolved;
            }
            Ok(())
        }
        Value::Array(items) => {
            items.iter_mut().try_for_each(|v| resolve_placeholders(v, env, secrets, missing))
        }
        Value::Object(map) => {
            map.values_mut().try_for_each(|v| resolve_placeholders(v, env, secrets, missing))
        }
        _ => Ok(()),
    }
}

fn resolve_string(
    text: &str,
    env: &Environment,
    secrets: &Secrets,
    missing: MissingSecret,
) -> Result<Option<Value>, HarnessError> {
    let re = placeholder_regex();
    if !re.is_match(text) {
        return Ok(None);
    }

    if let Some(caps) = re.captures(text) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        if whole == text && &caps[1] == "secret" {
            if let Some(secret) = secrets.get(&caps[2]) {
                return Ok(Some(secret.clone()));
            }
        }
    }

    let mut failure = None;
    let replaced = re.replace_all(text, |caps: &Captures<'_>| {
        let placeholder = caps[0].to_string();
        let found = match &caps[1] {
            "env" => env.get(&caps[2]).map(ToString::to_string),
            _ => match secrets.get(&caps[2]) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
                None if missing == MissingSecret::Redact => {
                    warn!(placeholder = %placeholder, "secret unavailable; substituting redaction marker");
                    Some(REDACTED.to_string())
                }
                None => None,
            },
        };
        found.unwrap_or_else(|| {
            failure.get_or_insert(placeholder.clone());
            placeholder
        })
    });

    match failure {
        Some(placeholder) => Err(HarnessError::SecretsUnresolved { placeholder }),
        None => Ok(Some(Value::String(replaced.into_owned()))),
    }
}

/// Reads a config file and resolves its placeholders.
///
/// A missing file yields an empty object.
///
/// # Errors
///
/// Returns [`HarnessError::Settings`] for unreadable or non-JSON files and
/// [`HarnessError::SecretsUnresolved`] for missing placeholder values.
pub fn load_config(
    path: &Path,
    env: &Environment,
    secrets: &Secrets,
    missing: MissingSecret,
) -> Result<Value, HarnessError> {
    if !path.is_file() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let mut config: Value = serde_json::from_str(&content)
        .map_err(|e| HarnessError::Settings { path: path.to_path_buf(), reason: e.to_string() })?;
    resolve_placeholders(&mut config, env, secrets, missing)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secrets() -> Secrets {
        match json!({"api_key": "k-123", "port": 8443, "oauth": {"id": "cid"}}) {
            Value::Object(map) => Secrets::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn resolves_env_and_secret_placeholders() {
        let env = Environment::from_pairs([("API_URL", "https://api.example.com")]);
        let mut config = json!({
            "url": "{{ env.API_URL }}/v1",
            "auth": ["Bearer {{secret.api_key}}", "{{secret.oauth.id}}"],
            "port": "{{secret.port}}",
            "retries": 3,
        });
        resolve_placeholders(&mut config, &env, &secrets(), MissingSecret::Fail).unwrap();
        assert_eq!(
            config,
            json!({
                "url": "https://api.example.com/v1",
                "auth": ["Bearer k-123", "cid"],
                "port": 8443,
                "retries": 3,
            })
        );
    }

    #[test]
    fn missing_env_is_unresolved_even_when_redacting() {
        let mut config = json!({"url": "{{env.NOPE}}"});
        let err = resolve_placeholders(
            &mut config,
            &Environment::default(),
            &Secrets::default(),
            MissingSecret::Redact,
        )
        .unwrap_err();
        match err {
            HarnessError::SecretsUnresolved { placeholder } => assert_eq!(placeholder, "{{env.NOPE}}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_secret_fails_or_redacts() {
        let env = Environment::default();
        let mut strict = json!("{{secret.gone}}");
        assert!(matches!(
            resolve_placeholders(&mut strict, &env, &Secrets::default(), MissingSecret::Fail),
            Err(HarnessError::SecretsUnresolved { .. })
        ));

        let mut lenient = json!({"token": "{{secret.gone}}"});
        resolve_placeholders(&mut lenient, &env, &Secrets::default(), MissingSecret::Redact).unwrap();
        assert_eq!(lenient, json!({"token": REDACTED}));
    }

    #[test]
    fn dotenv_overlays_process_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "HARNESS_TEST_ONLY_VAR=from-file\n").unwrap();
        let env = Environment::load(&path).unwrap();
        assert_eq!(env.get("HARNESS_TEST_ONLY_VAR"), Some("from-file"));
        assert!(std::env::var("HARNESS_TEST_ONLY_VAR").is_err());
    }

    #[test]
    fn load_config_missing_file_is_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(
            &dir.path().join("config.json"),
            &Environment::default(),
            &Secrets::default(),
            MissingSecret::Fail,
        )
        .unwrap();
        assert_eq!(config, json!({}));
    }
}
