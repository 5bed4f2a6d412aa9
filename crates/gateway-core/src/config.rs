//! Layered configuration resolution.
//!
//! Precedence, narrowest to widest: explicit [`RequestOptions`](crate::options::RequestOptions)
//! fields set by the caller beat a [`ConfigProvider`] lookup, which beats the
//! process environment, which beats a provider adapter's own default.
//! Nothing in this module reaches for a value on its own; callers decide
//! which layer to consult and in what order — [`resolve`] is the one helper
//! that actually walks the chain.

use std::collections::HashMap;
use std::env;

/// A source of configuration values keyed by dotted path (`"openai.api_key"`,
/// `"retry.max_attempts"`). Implementors may back this with a TOML file, a
/// secrets manager, or an in-memory map; the gateway never assumes a format.
pub trait ConfigProvider: Send + Sync {
    /// Returns the value at `path`, or `None` if unset.
    fn get(&self, path: &str) -> Option<String>;
}

/// Reads `{PROVIDER}_{KEY}` environment variables, upper-cased, with dots
/// turned into underscores (`"openai.api_key"` -> `OPENAI_API_KEY`).
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider;

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self
    }

    fn env_key(path: &str) -> String {
        path.to_uppercase().replace('.', "_").replace('-', "_")
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get(&self, path: &str) -> Option<String> {
        env::var(Self::env_key(path)).ok()
    }
}

/// A fixed, in-memory config source — tests, or an application that already
/// has its own settings loaded and just wants to hand them to the gateway.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    values: HashMap<String, String>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(path.into(), value.into());
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get(&self, path: &str) -> Option<String> {
        self.values.get(path).cloned()
    }
}

/// Walks explicit > provider > environment > default, returning the first
/// `Some`. `explicit` is typically a field straight off `RequestOptions`.
pub fn resolve(
    explicit: Option<&str>,
    provider: Option<&dyn ConfigProvider>,
    path: &str,
    env_fallback: Option<&EnvConfigProvider>,
    default: Option<&str>,
) -> Option<String> {
    if let Some(value) = explicit {
        return Some(value.to_string());
    }
    if let Some(p) = provider {
        if let Some(value) = p.get(path) {
            return Some(value);
        }
    }
    if let Some(env) = env_fallback {
        if let Some(value) = env.get(path) {
            return Some(value);
        }
    }
    default.map(|d| d.to_string())
}
