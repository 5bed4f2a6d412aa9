//! The single, explicit, process-wide (but fully injectable) bundle of
//! registries a [`crate::request::Request`] carries by `Arc`.
//!
//! There is no hidden global state anywhere in this crate: a caller builds
//! one `GatewayRegistries`, wraps it in an `Arc`, and passes it to every
//! `Request`. Tests build a fresh one per test; a long-running host builds
//! one at startup and registers adapters into it as config loads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::adapter::ProviderAdapter;
use crate::cache::Cache;
use crate::capability::ProvidersRegistry;
use crate::circuit::{Circuit, CircuitConfig};
use crate::functions::FunctionRegistry;
use crate::stream::recovery::RecoveryRecord;

/// Bundles the capability registry, response cache, per-provider circuit
/// breakers, registered function handlers, configured provider adapters,
/// and in-flight stream recovery records.
pub struct GatewayRegistries {
    pub capabilities: ProvidersRegistry,
    pub cache: Cache,
    pub functions: FunctionRegistry,
    circuits: Mutex<HashMap<String, Arc<Circuit>>>,
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    recoveries: Mutex<HashMap<String, RecoveryRecord>>,
    default_circuit_config: CircuitConfig,
}

impl Default for GatewayRegistries {
    fn default() -> Self {
        Self {
            capabilities: ProvidersRegistry::default(),
            cache: Cache::new(),
            functions: FunctionRegistry::default(),
            circuits: Mutex::new(HashMap::new()),
            adapters: RwLock::new(HashMap::new()),
            recoveries: Mutex::new(HashMap::new()),
            default_circuit_config: CircuitConfig::default(),
        }
    }
}

impl GatewayRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: ProvidersRegistry) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Overrides the config newly-seen providers get their circuit built
    /// from. Only affects circuits not yet created by [`Self::circuit_for`];
    /// call before registering adapters.
    pub fn with_default_circuit_config(mut self, config: CircuitConfig) -> Self {
        self.default_circuit_config = config;
        self
    }

    /// Registers (or replaces) the adapter answering for `provider`.
    pub fn register_adapter(&self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.write().unwrap().insert(provider.into(), adapter);
    }

    pub fn adapter(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.read().unwrap().get(provider).cloned()
    }

    pub fn configured_providers(&self) -> Vec<String> {
        self.adapters.read().unwrap().keys().cloned().collect()
    }

    /// The circuit for `provider`, created lazily on first use with the
    /// registry's default config so callers never need to pre-register one.
    pub fn circuit_for(&self, provider: &str) -> Arc<Circuit> {
        let mut circuits = self.circuits.lock().unwrap();
        circuits
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(Circuit::new(self.default_circuit_config.clone())))
            .clone()
    }

    pub fn record_recovery(&self, record: RecoveryRecord) {
        self.recoveries.lock().unwrap().insert(record.recovery_id.clone(), record);
    }

    pub fn take_recovery(&self, recovery_id: &str) -> Option<RecoveryRecord> {
        self.recoveries.lock().unwrap().remove(recovery_id)
    }

    /// Ids of streams currently held for resumption.
    pub fn recoverable_ids(&self) -> Vec<String> {
        self.recoveries.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_for_is_stable_per_provider() {
        let registries = GatewayRegistries::new();
        let a = registries.circuit_for("openai");
        let b = registries.circuit_for("openai");
        assert!(Arc::ptr_eq(&a, &b));
        let c = registries.circuit_for("anthropic");
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn unregistered_adapter_is_none() {
        let registries = GatewayRegistries::new();
        assert!(registries.adapter("openai").is_none());
    }
}
