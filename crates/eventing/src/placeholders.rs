//! `{{...}}` placeholder resolution for metadata values.
//!
//! Two forms are understood:
//!
//! - `{{env:NAME}}` reads the process environment variable `NAME`;
//! - `{{key}}` reads `key` from the resolver's property map.
//!
//! Text outside placeholders is copied verbatim.

use std::collections::HashMap;

use thiserror::Error;

/// A placeholder that could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    /// The named key has no value.
    #[error("Property placeholder '{0}' could not be resolved")]
    Unresolved(String),

    /// A `{{` was opened but never closed.
    #[error("Unterminated placeholder in '{0}'")]
    Unterminated(String),
}

/// Resolves placeholders inside a metadata value.
pub trait PlaceholderResolver: Send + Sync {
    /// Returns `text` with every placeholder substituted.
    fn resolve(&self, text: &str) -> Result<String, PlaceholderError>;
}

/// Resolver backed by a property map, with optional `env:` lookups.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    properties: HashMap<String, String>,
    use_env: bool,
}

impl Placeholders {
    /// A resolver that only understands `{{env:NAME}}`.
    pub fn from_env() -> Self {
        Self {
            properties: HashMap::new(),
            use_env: true,
        }
    }

    /// A resolver over a fixed property map with no environment access.
    pub fn from_properties(properties: HashMap<String, String>) -> Self {
        Self {
            properties,
            use_env: false,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key.strip_prefix("env:") {
            Some(var) if self.use_env => std::env::var(var).ok(),
            Some(var) => self.properties.get(var).cloned(),
            None => self.properties.get(key).cloned(),
        }
    }
}

impl PlaceholderResolver for Placeholders {
    fn resolve(&self, text: &str) -> Result<String, PlaceholderError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| PlaceholderError::Unterminated(text.to_string()))?;
            let key = after[..end].trim();
            let value = self
                .lookup(key)
                .ok_or_else(|| PlaceholderError::Unresolved(key.to_string()))?;
            out.push_str(&value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(out)
    }
}
