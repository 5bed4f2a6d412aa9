//! Deterministic request fingerprinting for cache keys.

use sha2::{Digest, Sha256};

use crate::message::Message;
use crate::options::RequestOptions;

/// A hex-encoded SHA-256 digest identifying a `(provider, messages,
/// relevant_options)` triple. Collision-resistant for cache purposes;
/// equal inputs always hash to the same fingerprint regardless of map key
/// insertion order (the canonical JSON projection sorts keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The subset of options that affect output and therefore belong in the
/// fingerprint. Anything not listed here (retry, cache, timeout knobs) must
/// never perturb the hash, or semantically identical requests would miss.
fn canonical_projection(provider: &str, messages: &[Message], options: &RequestOptions) -> serde_json::Value {
    serde_json::json!({
        "provider": provider,
        "messages": messages,
        "model": options.model,
        "temperature": options.temperature,
        "top_p": options.top_p,
        "top_k": options.top_k,
        "max_tokens": options.max_tokens,
        "tools": options.tools,
        "response_format": options.response_format,
        "dimensions": options.dimensions,
    })
}

/// Recursively sorts object keys so the canonical bytes are stable
/// regardless of insertion order. The workspace turns on serde_json's
/// `preserve_order` feature (for `raw_value` support elsewhere), so `Map`
/// is insertion-ordered here and cannot be relied on to sort itself —
/// arbitrary nested values (a caller-supplied `tools`/`response_format`
/// schema) need an explicit pass before hashing.
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, serde_json::Value> = std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k, sort_keys(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Serializes `value` with map keys sorted recursively and hashes the
/// canonical bytes, so equal inputs always hash identically.
pub fn fingerprint(provider: &str, messages: &[Message], options: &RequestOptions) -> Fingerprint {
    let projection = sort_keys(canonical_projection(provider, messages, options));
    let canonical = serde_json::to_vec(&projection).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Fingerprint(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_requests_fingerprint_identically() {
        let messages = vec![Message::user("hi")];
        let options = RequestOptions::default();
        let a = fingerprint("openai", &messages, &options);
        let b = fingerprint("openai", &messages, &options);
        assert_eq!(a, b);
    }

    #[test]
    fn different_providers_fingerprint_differently() {
        let messages = vec![Message::user("hi")];
        let options = RequestOptions::default();
        let a = fingerprint("openai", &messages, &options);
        let b = fingerprint("anthropic", &messages, &options);
        assert_ne!(a, b);
    }

    #[test]
    fn irrelevant_options_do_not_change_fingerprint() {
        let messages = vec![Message::user("hi")];
        let mut a = RequestOptions::default();
        let mut b = RequestOptions::default();
        a.retry_count = Some(1);
        b.retry_count = Some(5);
        a.timeout = Some(1000);
        b.timeout = Some(9000);
        assert_eq!(
            fingerprint("openai", &messages, &a),
            fingerprint("openai", &messages, &b)
        );
    }
}
