//! Onion-style middleware around a dispatch.
//!
//! The orchestrator holds middleware in registration order. [`Next`] walks
//! that list front to back, so the first registered layer is outermost: it
//! runs first on the way in and last on the way out.

use serde_json::Value;
use skilldock_core::{ExecutionContext, Outcome};
use skilldock_skills::{cache_key, ResponseCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &ExecutionContext, next: Next<'_>) -> Outcome;
}

impl<F> Middleware for F
where
    F: Fn(&ExecutionContext, Next<'_>) -> Outcome + Send + Sync,
{
    fn handle(&self, ctx: &ExecutionContext, next: Next<'_>) -> Outcome {
        self(ctx, next)
    }
}

/// Cursor over the layers still to run, ending at the safe invocation of the
/// resolved skill.
pub struct Next<'a> {
    skill: &'a str,
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a (dyn Fn(&ExecutionContext) -> Outcome + 'a),
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        skill: &'a str,
        chain: &'a [Arc<dyn Middleware>],
        endpoint: &'a (dyn Fn(&ExecutionContext) -> Outcome + 'a),
    ) -> Self {
        Self {
            skill,
            chain,
            endpoint,
        }
    }

    /// Name of the resolved skill this dispatch ends at.
    pub fn skill(&self) -> &'a str {
        self.skill
    }

    /// Run the remaining layers.
    pub fn run(self, ctx: &ExecutionContext) -> Outcome {
        match self.chain.split_first() {
            Some((layer, rest)) => layer.handle(
                ctx,
                Next {
                    skill: self.skill,
                    chain: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }

    /// Number of middleware layers left before the skill itself.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Logs every request and response at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle(&self, ctx: &ExecutionContext, next: Next<'_>) -> Outcome {
        let params = Value::Object(ctx.parameters().clone());
        debug!(skill = %next.skill(), task = %ctx.task(), params = %params, "→ Request");
        let outcome = next.run(ctx);
        debug!(status = %outcome.status, "← Response: {}", outcome.message);
        outcome
    }
}

pub type CacheKeyFn = Arc<dyn Fn(&ExecutionContext) -> String + Send + Sync>;

/// Serves successful outcomes from a shared [`ResponseCache`].
///
/// Entries are scoped to the resolved skill, so the key function only has to
/// tell contexts apart. The default covers the task and parameters.
#[derive(Clone)]
pub struct CachingMiddleware {
    cache: ResponseCache,
    ttl: Duration,
    key_fn: CacheKeyFn,
}

impl CachingMiddleware {
    pub fn new(cache: ResponseCache, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            key_fn: Arc::new(cache_key),
        }
    }

    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&ExecutionContext) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

impl Middleware for CachingMiddleware {
    fn handle(&self, ctx: &ExecutionContext, next: Next<'_>) -> Outcome {
        let key = format!("{}:{}", next.skill(), (self.key_fn)(ctx));

        if let Some((mut outcome, cached_at)) = self.cache.get_fresh(&key, self.ttl) {
            debug!(key = %key, "⚡ Cache hit");
            outcome.annotate("cache_hit", true);
            outcome.annotate("cached_at", cached_at.to_rfc3339());
            return outcome;
        }

        let outcome = next.run(ctx);
        if outcome.is_success() {
            self.cache.insert(key.clone(), outcome.clone());
            debug!(key = %key, "💾 Cached result");
        }
        outcome
    }
}
