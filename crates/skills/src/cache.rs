use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use skilldock_core::{ExecutionContext, Outcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: Outcome,
    stored_at: Instant,
    cached_at: DateTime<Utc>,
}

/// In-memory outcome store with per-lookup TTL.
///
/// Cloning shares the underlying map, so one cache can back several wrapped
/// skills or a middleware layer.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `key` if it is younger than `ttl`, along with the
    /// wall-clock time it was stored. Expired entries are evicted.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<(Outcome, DateTime<Utc>)> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < ttl => {
                Some((entry.outcome.clone(), entry.cached_at))
            }
            Some(_) => {
                debug!(key = %key, "Cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, outcome: Outcome) -> DateTime<Utc> {
        let cached_at = Utc::now();
        let entry = CacheEntry {
            outcome,
            stored_at: Instant::now(),
            cached_at,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), entry);
        cached_at
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Deterministic key over the task and parameters. Object keys are sorted at
/// every level so insertion order does not matter.
pub fn cache_key(ctx: &ExecutionContext) -> String {
    let params = canonicalize(&Value::Object(ctx.parameters().clone()));
    let mut hasher = Sha256::new();
    hasher.update(ctx.task().as_bytes());
    hasher.update([0u8]);
    hasher.update(params.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
