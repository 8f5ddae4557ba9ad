//! Stackable behaviour modifiers around a [`Skill`].
//!
//! Each wrapper owns its inner skill and is itself a `Skill`, so wrappers nest
//! in any order. Gates (`Validated`, `RequireParams`) answer with FAILURE
//! without calling the inner skill. `Err` from the inner skill passes through
//! every wrapper untouched; containing it is the orchestrator's job.

use chrono::Utc;
use serde_json::{Map, Value};
use skilldock_core::{details, Describable, ExecutionContext, Outcome, Result, Skill, Validatable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::cache::{cache_key, ResponseCache};

macro_rules! delegate_skill_shape {
    () => {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn as_validatable(&self) -> Option<&dyn Validatable> {
            self.inner.as_validatable()
        }

        fn as_describable(&self) -> Option<&dyn Describable> {
            self.inner.as_describable()
        }
    };
}

/// Rejects contexts with an empty task.
pub struct Validated<S> {
    inner: S,
}

impl<S: Skill> Skill for Validated<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        if let Err(e) = ctx.validate() {
            warn!(skill = %self.inner.name(), error = %e, "Context validation failed");
            return Ok(Outcome::failure(format!("Invalid context: {}", e)).with_error_details(
                details([
                    ("wrapper", "validate_context".to_string()),
                    ("skill", self.inner.name().to_string()),
                    ("reason", e.to_string()),
                ]),
            ));
        }
        self.inner.execute(ctx)
    }
}

/// Records elapsed milliseconds and the start timestamp.
pub struct Timed<S> {
    inner: S,
}

impl<S: Skill> Skill for Timed<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut outcome = self.inner.execute(ctx)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        outcome.annotate("execution_time_ms", elapsed_ms);
        outcome.annotate("execution_timestamp", started_at.to_rfc3339());
        Ok(outcome)
    }
}

/// Emits entry and exit events. Never touches the outcome.
pub struct Logged<S> {
    inner: S,
}

impl<S: Skill> Skill for Logged<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let skill = self.inner.name();
        info!(skill = %skill, task = %ctx.task(), priority = %ctx.priority(), "→ Entering skill");

        let start = Instant::now();
        let result = self.inner.execute(ctx);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(outcome) if outcome.is_success() => info!(
                skill = %skill,
                task = %ctx.task(),
                status = %outcome.status,
                elapsed_ms,
                "← Exiting skill: {}",
                outcome.message
            ),
            Ok(outcome) => error!(
                skill = %skill,
                task = %ctx.task(),
                status = %outcome.status,
                elapsed_ms,
                "← Exiting skill: {}",
                outcome.message
            ),
            Err(e) => error!(
                skill = %skill,
                task = %ctx.task(),
                elapsed_ms,
                error = %e,
                "← Skill raised an error"
            ),
        }
        result
    }
}

/// Serves successful outcomes from a [`ResponseCache`] within a TTL.
pub struct Cached<S> {
    inner: S,
    cache: ResponseCache,
    ttl: Duration,
}

impl<S> Cached<S> {
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

impl<S: Skill> Skill for Cached<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let key = cache_key(ctx);

        if let Some((mut outcome, cached_at)) = self.cache.get_fresh(&key, self.ttl) {
            info!(skill = %self.inner.name(), task = %ctx.task(), "💾 Cache hit");
            outcome.annotate("cache_hit", true);
            outcome.annotate("cached_at", cached_at.to_rfc3339());
            return Ok(outcome);
        }

        let mut outcome = self.inner.execute(ctx)?;
        if outcome.is_success() {
            self.cache.insert(key, outcome.clone());
        }
        outcome.annotate("cache_hit", false);
        Ok(outcome)
    }
}

/// Delay before the attempt following `attempt` (1-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

pub type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Re-invokes the inner skill on FAILURE-like outcomes with exponential
/// backoff. The wait blocks the calling thread.
pub struct Retry<S> {
    inner: S,
    max_attempts: u32,
    base_delay: Duration,
    sleep: SleepFn,
}

impl<S> Retry<S> {
    /// Replace the blocking wait between attempts.
    pub fn with_sleep<F>(mut self, sleep: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleep = Arc::new(sleep);
        self
    }
}

impl<S: Skill> Skill for Retry<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let mut outcome = self.inner.execute(ctx)?;

            if outcome.is_success() {
                outcome.annotate("retry_attempt", attempt);
                outcome.annotate("retry_needed", attempt > 1);
                return Ok(outcome);
            }

            if attempt >= max_attempts {
                warn!(
                    skill = %self.inner.name(),
                    attempts = max_attempts,
                    "All retry attempts failed"
                );
                outcome.message = format!(
                    "{} (failed after {} attempts)",
                    outcome.message, max_attempts
                );
                outcome.annotate("retry_attempts", max_attempts);
                outcome.annotate("all_attempts_failed", true);
                return Ok(outcome);
            }

            let delay = backoff_delay(self.base_delay, attempt);
            warn!(
                skill = %self.inner.name(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "🔄 Attempt failed, retrying: {}",
                outcome.message
            );
            (self.sleep)(delay);
            attempt += 1;
        }
    }
}

/// Fails fast when any of a fixed set of parameter keys is absent.
pub struct RequireParams<S> {
    inner: S,
    required: Vec<String>,
}

impl<S: Skill> Skill for RequireParams<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let missing: Vec<&String> = self
            .required
            .iter()
            .filter(|key| !ctx.parameters().contains_key(key.as_str()))
            .collect();

        if missing.is_empty() {
            return self.inner.execute(ctx);
        }

        let missing_list = missing
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        warn!(skill = %self.inner.name(), missing = %missing_list, "Missing required parameters");

        let mut error_details = Map::new();
        error_details.insert("wrapper".into(), "require_params".into());
        error_details.insert("skill".into(), self.inner.name().into());
        error_details.insert("missing_params".into(), Value::from(missing.into_iter().cloned().collect::<Vec<_>>()));
        error_details.insert("required_params".into(), Value::from(self.required.clone()));
        error_details.insert(
            "received_params".into(),
            Value::from(ctx.parameters().keys().cloned().collect::<Vec<_>>()),
        );

        Ok(Outcome::failure(format!("Missing required parameters: {}", missing_list))
            .with_error_details(error_details))
    }
}

/// Merges fixed key/value pairs into every outcome's metadata.
pub struct Enriched<S> {
    inner: S,
    fields: Map<String, Value>,
}

impl<S: Skill> Skill for Enriched<S> {
    delegate_skill_shape!();

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let mut outcome = self.inner.execute(ctx)?;
        for (key, value) in &self.fields {
            outcome.annotate(key.clone(), value.clone());
        }
        outcome.annotate("enriched_by", "enrich_metadata");
        Ok(outcome)
    }
}

/// Builder methods for stacking wrappers:
///
/// ```ignore
/// let skill = my_skill
///     .require_params(["path"])
///     .retry(3, Duration::from_millis(200))
///     .standard();
/// ```
pub trait SkillExt: Skill + Sized {
    fn validated(self) -> Validated<Self> {
        Validated { inner: self }
    }

    fn timed(self) -> Timed<Self> {
        Timed { inner: self }
    }

    fn logged(self) -> Logged<Self> {
        Logged { inner: self }
    }

    /// Cache with a private store.
    fn cached(self, ttl: Duration) -> Cached<Self> {
        self.cached_in(ResponseCache::new(), ttl)
    }

    fn cached_in(self, cache: ResponseCache, ttl: Duration) -> Cached<Self> {
        Cached {
            inner: self,
            cache,
            ttl,
        }
    }

    fn retry(self, max_attempts: u32, base_delay: Duration) -> Retry<Self> {
        Retry {
            inner: self,
            max_attempts,
            base_delay,
            sleep: Arc::new(std::thread::sleep),
        }
    }

    fn require_params<I, K>(self, keys: I) -> RequireParams<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        RequireParams {
            inner: self,
            required: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn enriched(self, fields: Map<String, Value>) -> Enriched<Self> {
        Enriched {
            inner: self,
            fields,
        }
    }

    /// Validation, timing and logging, innermost first.
    fn standard(self) -> Logged<Timed<Validated<Self>>> {
        self.validated().timed().logged()
    }
}

impl<S: Skill> SkillExt for S {}
