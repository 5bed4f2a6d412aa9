//! Static lookup of provider/model capabilities, context windows, and pricing.

pub mod registry;
pub mod types;

pub use types::{Feature, ModelDefaults, ModelInfo, ModelPricing, ProviderInfo, ProvidersRegistry};

use std::collections::{HashMap, HashSet};

fn model(
    id: &str,
    features: &[Feature],
    context_window: u64,
    max_output_tokens: u64,
    input: f64,
    output: f64,
) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        features: features.iter().copied().collect(),
        context_window: Some(context_window),
        max_output_tokens: Some(max_output_tokens),
        pricing: ModelPricing {
            input: Some(input),
            output: Some(output),
            cache_read: None,
            cache_write: None,
            currency: "USD".to_string(),
        },
        endpoints: HashSet::from(["chat".to_string()]),
    }
}

/// A handful of illustrative provider/model entries, enough for tests and
/// `compare_models`/`recommend_models` to have real data — not a maintained
/// pricing catalogue (that's explicitly out of scope).
pub fn static_tables() -> ProvidersRegistry {
    use Feature::*;

    let mut providers = HashMap::new();

    let mut openai_models = HashMap::new();
    openai_models.insert(
        "gpt-4o".to_string(),
        model(
            "gpt-4o",
            &[Streaming, Vision, FunctionCalling, JsonMode],
            128_000,
            16_384,
            2.50,
            10.00,
        ),
    );
    openai_models.insert(
        "gpt-4o-mini".to_string(),
        model(
            "gpt-4o-mini",
            &[Streaming, Vision, FunctionCalling, JsonMode],
            128_000,
            16_384,
            0.15,
            0.60,
        ),
    );
    providers.insert(
        "openai".to_string(),
        ProviderInfo {
            id: "openai".to_string(),
            name: "OpenAI".to_string(),
            env: vec!["OPENAI_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: openai_models,
        },
    );

    let mut anthropic_models = HashMap::new();
    anthropic_models.insert(
        "claude-3-5-sonnet-latest".to_string(),
        model(
            "claude-3-5-sonnet-latest",
            &[Streaming, Vision, FunctionCalling, Reasoning, CachedInput],
            200_000,
            8_192,
            3.00,
            15.00,
        ),
    );
    providers.insert(
        "anthropic".to_string(),
        ProviderInfo {
            id: "anthropic".to_string(),
            name: "Anthropic".to_string(),
            env: vec!["ANTHROPIC_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: anthropic_models,
        },
    );

    let mut gemini_models = HashMap::new();
    gemini_models.insert(
        "gemini-1.5-pro".to_string(),
        model(
            "gemini-1.5-pro",
            &[Streaming, Vision, FunctionCalling, AudioInput],
            2_000_000,
            8_192,
            1.25,
            5.00,
        ),
    );
    providers.insert(
        "gemini".to_string(),
        ProviderInfo {
            id: "gemini".to_string(),
            name: "Gemini".to_string(),
            env: vec!["GEMINI_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: gemini_models,
        },
    );

    let mut groq_models = HashMap::new();
    groq_models.insert(
        "llama-3.3-70b-versatile".to_string(),
        model(
            "llama-3.3-70b-versatile",
            &[Streaming, FunctionCalling],
            128_000,
            32_768,
            0.59,
            0.79,
        ),
    );
    providers.insert(
        "groq".to_string(),
        ProviderInfo {
            id: "groq".to_string(),
            name: "Groq".to_string(),
            env: vec!["GROQ_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: groq_models,
        },
    );

    let mut openrouter_models = HashMap::new();
    openrouter_models.insert(
        "openrouter/auto".to_string(),
        model("openrouter/auto", &[Streaming, FunctionCalling], 128_000, 8_192, 1.0, 3.0),
    );
    providers.insert(
        "openrouter".to_string(),
        ProviderInfo {
            id: "openrouter".to_string(),
            name: "OpenRouter".to_string(),
            env: vec!["OPENROUTER_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: openrouter_models,
        },
    );

    let mut ollama_models = HashMap::new();
    ollama_models.insert(
        "llama3".to_string(),
        ModelInfo {
            id: "llama3".to_string(),
            name: "llama3".to_string(),
            features: HashSet::from([Streaming]),
            context_window: Some(8_192),
            max_output_tokens: Some(4_096),
            pricing: ModelPricing::default(),
            endpoints: HashSet::from(["chat".to_string()]),
        },
    );
    providers.insert(
        "ollama".to_string(),
        ProviderInfo {
            id: "ollama".to_string(),
            name: "Ollama".to_string(),
            env: vec!["OLLAMA_HOST".to_string()],
            defaults: ModelDefaults::default(),
            models: ollama_models,
        },
    );

    let mut bedrock_models = HashMap::new();
    bedrock_models.insert(
        "anthropic.claude-3-sonnet".to_string(),
        model(
            "anthropic.claude-3-sonnet",
            &[Streaming, Vision, FunctionCalling],
            200_000,
            4_096,
            3.00,
            15.00,
        ),
    );
    providers.insert(
        "bedrock".to_string(),
        ProviderInfo {
            id: "bedrock".to_string(),
            name: "Amazon Bedrock".to_string(),
            env: vec!["AWS_ACCESS_KEY_ID".to_string(), "AWS_SECRET_ACCESS_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: bedrock_models,
        },
    );

    let mut xai_models = HashMap::new();
    xai_models.insert(
        "grok-2".to_string(),
        model("grok-2", &[Streaming, FunctionCalling], 131_072, 8_192, 2.0, 10.0),
    );
    providers.insert(
        "xai".to_string(),
        ProviderInfo {
            id: "xai".to_string(),
            name: "xAI".to_string(),
            env: vec!["XAI_API_KEY".to_string()],
            defaults: ModelDefaults::default(),
            models: xai_models,
        },
    );

    // LM Studio serves whatever the user has loaded locally, so a model
    // entry only records what's model-specific (here, nothing beyond its
    // name); context window, output cap, and free pricing come from the
    // provider's defaults and are inherited at lookup time.
    let mut lmstudio_models = HashMap::new();
    lmstudio_models.insert(
        "local-model".to_string(),
        ModelInfo {
            id: "local-model".to_string(),
            name: "local-model".to_string(),
            endpoints: HashSet::from(["chat".to_string()]),
            ..ModelInfo::default()
        },
    );
    providers.insert(
        "lmstudio".to_string(),
        ProviderInfo {
            id: "lmstudio".to_string(),
            name: "LM Studio".to_string(),
            env: vec![],
            defaults: ModelDefaults {
                features: HashSet::from([Streaming]),
                context_window: Some(8_192),
                max_output_tokens: Some(4_096),
                pricing: ModelPricing::default(),
            },
            models: lmstudio_models,
        },
    );

    let mut mock_models = HashMap::new();
    mock_models.insert(
        "mock-model".to_string(),
        model(
            "mock-model",
            &[Streaming, FunctionCalling, Embeddings],
            8_192,
            4_096,
            0.0,
            0.0,
        ),
    );
    providers.insert(
        "mock".to_string(),
        ProviderInfo {
            id: "mock".to_string(),
            name: "Mock".to_string(),
            env: vec![],
            defaults: ModelDefaults::default(),
            models: mock_models,
        },
    );

    ProvidersRegistry { providers }
}
