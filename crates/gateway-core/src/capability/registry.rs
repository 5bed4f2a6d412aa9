use super::types::{Feature, ModelInfo, ModelPricing, ProviderInfo, ProvidersRegistry};

/// Providers whose model catalogue is a known alias of another provider's —
/// e.g. "codex" serves the OpenAI catalogue, "kimi-code" serves Moonshot's.
/// Looked up only when the direct (provider, model) pair misses.
const PROVIDER_ALIASES: &[(&str, &str)] = &[("codex", "openai"), ("kimi-code", "moonshotai")];

impl ProvidersRegistry {
    pub fn get_provider(&self, id: &str) -> Option<&ProviderInfo> {
        self.providers.get(id)
    }

    /// Looks up a model, merging in its provider's defaults, falling back to
    /// an aliased provider's catalogue when the model isn't registered
    /// directly under `provider`. Per the capability registry's contract, an
    /// unknown (provider, model) never raises — it's `None`, not an error.
    pub fn get_model(&self, provider: &str, model: &str) -> Option<ModelInfo> {
        if let Some(found) = self.providers.get(provider).and_then(|p| p.resolve_model(model)) {
            return Some(found);
        }
        PROVIDER_ALIASES
            .iter()
            .find(|(alias, _)| *alias == provider)
            .and_then(|(_, canonical)| self.providers.get(*canonical))
            .and_then(|p| p.resolve_model(model))
    }

    pub fn list_providers(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    pub fn list_models(&self, provider: &str) -> Vec<&str> {
        self.providers
            .get(provider)
            .map(|p| p.models.keys().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn get_pricing(&self, provider: &str, model: &str) -> Option<ModelPricing> {
        self.get_model(provider, model).map(|m| m.pricing)
    }

    pub fn context_window(&self, provider: &str, model: &str) -> Option<u64> {
        self.get_model(provider, model).and_then(|m| m.context_window)
    }

    /// `supports?(provider, model, feature)` — `feature` is normalized
    /// through [`Feature::from_alias`] first, so an alias and its canonical
    /// tag agree (the capability-normalization invariant).
    pub fn supports(&self, provider: &str, model: &str, feature: &str) -> bool {
        let Some(canonical) = Feature::from_alias(feature) else {
            return false;
        };
        self.get_model(provider, model)
            .map(|m| m.supports(canonical))
            .unwrap_or(false)
    }

    /// All (provider, model) ids that declare every feature in `features`,
    /// including features a model only has by way of its provider's defaults.
    pub fn find_models_with_features(&self, features: &[Feature]) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (provider_id, provider) in &self.providers {
            for model_id in provider.models.keys() {
                let Some(resolved) = provider.resolve_model(model_id) else { continue };
                if features.iter().all(|f| resolved.supports(*f)) {
                    out.push((provider_id.clone(), model_id.clone()));
                }
            }
        }
        out.sort();
        out
    }

    /// A side-by-side comparison of the named (provider, model) pairs, for
    /// `compare_models`. Entries that don't resolve are simply omitted —
    /// comparison never raises on an unknown pair.
    pub fn compare(&self, refs: &[(&str, &str)]) -> Vec<(String, String, ModelInfo)> {
        refs.iter()
            .filter_map(|(provider, model)| {
                self.get_model(provider, model)
                    .map(|info| (provider.to_string(), model.to_string(), info))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn registry_with(models: Vec<(&str, &str, HashSet<Feature>)>) -> ProvidersRegistry {
        let mut providers: HashMap<String, ProviderInfo> = HashMap::new();
        for (provider, model, features) in models {
            let entry = providers.entry(provider.to_string()).or_insert_with(|| ProviderInfo {
                id: provider.to_string(),
                name: provider.to_string(),
                ..Default::default()
            });
            entry.models.insert(
                model.to_string(),
                ModelInfo {
                    id: model.to_string(),
                    name: model.to_string(),
                    features,
                    ..Default::default()
                },
            );
        }
        ProvidersRegistry { providers }
    }

    #[test]
    fn codex_falls_back_to_openai_catalogue() {
        let registry = registry_with(vec![("openai", "gpt-4", HashSet::new())]);
        assert!(registry.get_model("codex", "gpt-4").is_some());
    }

    #[test]
    fn unknown_pair_is_none_not_error() {
        let registry = registry_with(vec![]);
        assert!(registry.get_model("nope", "nope").is_none());
    }

    #[test]
    fn supports_is_alias_invariant() {
        let registry = registry_with(vec![(
            "openai",
            "gpt-4",
            HashSet::from([Feature::FunctionCalling]),
        )]);
        assert_eq!(
            registry.supports("openai", "gpt-4", "tools"),
            registry.supports("openai", "gpt-4", "function_calling")
        );
        assert!(registry.supports("openai", "gpt-4", "tools"));
    }

    #[test]
    fn find_models_with_features_requires_all() {
        let registry = registry_with(vec![
            (
                "openai",
                "gpt-4",
                HashSet::from([Feature::Vision, Feature::FunctionCalling]),
            ),
            ("openai", "gpt-3.5", HashSet::from([Feature::FunctionCalling])),
        ]);
        let found = registry.find_models_with_features(&[Feature::Vision, Feature::FunctionCalling]);
        assert_eq!(found, vec![("openai".to_string(), "gpt-4".to_string())]);
    }

    #[test]
    fn model_entry_inherits_unset_fields_from_provider_defaults() {
        let mut providers: HashMap<String, ProviderInfo> = HashMap::new();
        providers.insert(
            "lmstudio".to_string(),
            ProviderInfo {
                id: "lmstudio".to_string(),
                name: "LM Studio".to_string(),
                defaults: super::super::types::ModelDefaults {
                    features: HashSet::from([Feature::Streaming]),
                    context_window: Some(8_192),
                    max_output_tokens: Some(4_096),
                    pricing: ModelPricing::default(),
                },
                models: HashMap::from([(
                    "local-model".to_string(),
                    ModelInfo {
                        id: "local-model".to_string(),
                        name: "local-model".to_string(),
                        ..ModelInfo::default()
                    },
                )]),
                ..Default::default()
            },
        );
        let registry = ProvidersRegistry { providers };

        let resolved = registry.get_model("lmstudio", "local-model").unwrap();
        assert_eq!(resolved.context_window, Some(8_192));
        assert!(resolved.supports(Feature::Streaming));
    }

    #[test]
    fn model_level_field_overrides_provider_default() {
        let mut providers: HashMap<String, ProviderInfo> = HashMap::new();
        providers.insert(
            "lmstudio".to_string(),
            ProviderInfo {
                id: "lmstudio".to_string(),
                name: "LM Studio".to_string(),
                defaults: super::super::types::ModelDefaults {
                    context_window: Some(8_192),
                    ..Default::default()
                },
                models: HashMap::from([(
                    "big-context-model".to_string(),
                    ModelInfo {
                        id: "big-context-model".to_string(),
                        name: "big-context-model".to_string(),
                        context_window: Some(32_768),
                        ..ModelInfo::default()
                    },
                )]),
                ..Default::default()
            },
        );
        let registry = ProvidersRegistry { providers };

        let resolved = registry.get_model("lmstudio", "big-context-model").unwrap();
        assert_eq!(resolved.context_window, Some(32_768));
    }
}
