//! Pattern substitutions that neutralize non-deterministic text in log
//! messages before comparison.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::HarnessError;

/// One regex substitution.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pattern: Regex,
    replacement: String,
}

impl Normalizer {
    /// Compiles a normalizer. The replacement may reference groups as `$1`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] if `pattern` does not compile.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, HarnessError> {
        let pattern = Regex::new(pattern).map_err(|e| HarnessError::pattern("normalizer", pattern, &e))?;
        Ok(Self { pattern, replacement: replacement.into() })
    }

    /// Applies the substitution to every match in `text`.
    #[must_use]
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

/// Timestamps, UUIDs and epoch numbers, in that order.
#[must_use]
pub fn builtin_normalizers() -> &'static [Normalizer] {
    static BUILTINS: OnceLock<Vec<Normalizer>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        [
            (
                r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
                "<TIMESTAMP>",
            ),
            (
                r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
                "<UUID>",
            ),
            (r"\b\d{10,13}\b", "<EPOCH>"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            Normalizer::new(pattern, replacement)
                .unwrap_or_else(|e| panic!("static normalizer regex failed to compile: {e}"))
        })
        .collect()
    })
}

/// Runs the built-ins, then `extra` in order.
#[must_use]
pub fn normalize(message: &str, extra: &[Normalizer]) -> String {
    builtin_normalizers()
        .iter()
        .chain(extra)
        .fold(message.to_string(), |text, n| n.apply(&text).into_owned())
}
