//! Response cache with single-flight collapsing of concurrent producers.

pub mod fingerprint;

pub use fingerprint::{fingerprint, Fingerprint};

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::error::GatewayError;
use crate::response::LLMResponse;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry {
    value: LLMResponse,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

type InFlight = Shared<BoxFuture<'static, Result<LLMResponse, GatewayError>>>;

#[derive(Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Caches [`LLMResponse`]s by fingerprint, collapsing concurrent producers
/// for the same key into a single in-flight future so N identical
/// concurrent requests result in exactly one adapter call.
pub struct Cache {
    entries: Mutex<HashMap<Fingerprint, Entry>>,
    in_flight: Mutex<HashMap<Fingerprint, InFlight>>,
    stats: Mutex<CacheStats>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> (u64, u64) {
        let stats = self.stats.lock().unwrap();
        (stats.hits, stats.misses)
    }

    fn get_fresh(&self, key: &Fingerprint) -> Option<LLMResponse> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_fresh() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Returns a fresh cached value, or runs `producer` — collapsing
    /// concurrent callers for the same `key` onto the same in-flight
    /// future. The in-flight marker is always cleared on completion,
    /// success or failure, so a failed producer never wedges the key.
    pub async fn with_cache<F>(&self, key: Fingerprint, ttl: Duration, producer: F) -> Result<LLMResponse, GatewayError>
    where
        F: std::future::Future<Output = Result<LLMResponse, GatewayError>> + Send + 'static,
    {
        if let Some(hit) = self.get_fresh(&key) {
            self.stats.lock().unwrap().hits += 1;
            return Ok(hit);
        }

        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&key) {
                existing.clone()
            } else {
                let shared: InFlight = producer.boxed().shared();
                in_flight.insert(key.clone(), shared.clone());
                shared
            }
        };

        self.stats.lock().unwrap().misses += 1;
        let result = shared.await;
        self.in_flight.lock().unwrap().remove(&key);

        if let Ok(value) = &result {
            self.entries.lock().unwrap().insert(
                key,
                Entry {
                    value: value.clone(),
                    inserted_at: Instant::now(),
                    ttl,
                },
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Usage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_identical_requests_call_producer_once() {
        let cache = Arc::new(Cache::new());
        let calls = Arc::new(AtomicU32::new(0));
        let key = Fingerprint("k".to_string());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .with_cache(key, DEFAULT_TTL, {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(LLMResponse::new("hi", "mock", Usage::new(1, 1)))
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_producer_allows_retry() {
        let cache = Cache::new();
        let key = Fingerprint("k".to_string());
        let first = cache
            .with_cache(key.clone(), DEFAULT_TTL, async {
                Err(GatewayError::NetworkError("boom".into()))
            })
            .await;
        assert!(first.is_err());
        let second = cache
            .with_cache(key, DEFAULT_TTL, async { Ok(LLMResponse::new("ok", "mock", Usage::new(1, 1))) })
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn hit_and_miss_counted() {
        let cache = Cache::new();
        let key = Fingerprint("k".to_string());
        cache
            .with_cache(key.clone(), DEFAULT_TTL, async { Ok(LLMResponse::new("ok", "mock", Usage::new(1, 1))) })
            .await
            .unwrap();
        cache
            .with_cache(key, DEFAULT_TTL, async { Ok(LLMResponse::new("ok", "mock", Usage::new(1, 1))) })
            .await
            .unwrap();
        let (hits, misses) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }
}
