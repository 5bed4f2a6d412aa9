//! Parsing for the `"provider/model"` combined identifier accepted
//! throughout the facade (`Gateway::chat("openai/gpt-4o", ...)`,
//! `"anthropic"` alone, ...).
//!
//! This plays the same role as `provider-common`'s model-reference parser —
//! turn a single string identifier into a structured reference — but for a
//! much simpler grammar: no HuggingFace repo/filename resolution, no GGUF
//! quantization suffix, just `provider` or `provider/model`.

/// A parsed `"provider/model"` identifier. `model` is `None` when the input
/// carried no slash, in which case the caller falls back to whatever
/// default model the provider adapter is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef<'a> {
    pub provider: &'a str,
    pub model: Option<&'a str>,
}

/// Splits `"provider/model"` into `(provider, Some(model))`; a bare
/// provider id with no slash returns `(provider, None)`. Only the first
/// slash is significant — a model id that itself contains a slash (some
/// OpenRouter model ids do, e.g. `"mistralai/mistral-7b"`) is kept whole
/// on the model side.
pub fn parse_provider_model(spec: &str) -> ModelRef<'_> {
    match spec.split_once('/') {
        Some((provider, model)) => ModelRef { provider, model: Some(model) },
        None => ModelRef { provider: spec, model: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_provider_has_no_model() {
        let parsed = parse_provider_model("openai");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model, None);
    }

    #[test]
    fn provider_and_model_split_on_first_slash() {
        let parsed = parse_provider_model("openai/gpt-4o");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model, Some("gpt-4o"));
    }

    #[test]
    fn model_ids_containing_a_slash_stay_whole() {
        let parsed = parse_provider_model("openrouter/mistralai/mistral-7b");
        assert_eq!(parsed.provider, "openrouter");
        assert_eq!(parsed.model, Some("mistralai/mistral-7b"));
    }
}
