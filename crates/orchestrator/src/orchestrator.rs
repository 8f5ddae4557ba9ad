use serde_json::Value;
use skilldock_core::{
    details, Error, ExecutionContext, OrchestratorConfig, Outcome, Priority, Result, Skill,
};
use skilldock_skills::SkillIndex;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::middleware::{Middleware, Next};

/// Single entry point for dispatching skills by name.
///
/// `execute` never returns an error and never unwinds: not-found names,
/// faults, panics and contract violations all come back as FAILURE outcomes.
pub struct Orchestrator {
    index: Arc<dyn SkillIndex>,
    config: OrchestratorConfig,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Orchestrator {
    pub fn new(index: Arc<dyn SkillIndex>, config: OrchestratorConfig) -> Self {
        Self {
            index,
            config,
            middleware: Vec::new(),
        }
    }

    /// Append a middleware layer. Layers registered earlier wrap later ones.
    pub fn add_middleware<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        self.middleware.push(Arc::new(middleware));
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn available_skills(&self) -> Vec<String> {
        self.index.list_names()
    }

    pub fn execute(&self, name: &str, ctx: &ExecutionContext) -> Outcome {
        if self.config.enable_logging {
            info!(skill = %name, priority = %ctx.priority(), "⚙ Executing");
        }

        let Some(record) = self.index.lookup(name) else {
            return self.not_found(name);
        };

        let start = Instant::now();
        let mut outcome = self.run_chain(record.skill().clone(), ctx);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.config.enable_timing {
            outcome.annotate("execution_time_ms", elapsed_ms);
            outcome.annotate("skill_name", name);
        }

        if self.config.enable_logging {
            let glyph = if outcome.is_success() { "✓" } else { "✗" };
            info!(
                skill = %name,
                status = %outcome.status,
                "{} {}: {} ({:.2}ms)",
                glyph,
                name,
                outcome.message,
                elapsed_ms
            );
        }

        outcome
    }

    /// Dispatch in order. A failed CRITICAL item stops the batch, so the
    /// result may be a prefix of the input.
    pub fn execute_batch<I, N>(&self, items: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = (N, ExecutionContext)>,
        N: AsRef<str>,
    {
        let mut outcomes = Vec::new();

        for (name, ctx) in items {
            let name = name.as_ref();
            let outcome = self.execute(name, &ctx);
            let abort = !outcome.is_success() && ctx.priority() == Priority::Critical;
            outcomes.push(outcome);

            if abort {
                error!(skill = %name, "⚠ Critical task failed, aborting batch");
                break;
            }
        }

        outcomes
    }

    /// Run a skill's validation entry point without executing it.
    pub fn validate(&self, name: &str, ctx: &ExecutionContext) -> Outcome {
        let Some(record) = self.index.lookup(name) else {
            return self.not_found(name);
        };
        let skill = record.skill();

        if skill.as_validatable().is_none() {
            return Outcome::skipped(format!("Skill '{}' does not support validation", name));
        }

        contain(name, || match skill.as_validatable() {
            Some(v) => v.validate(ctx),
            None => Ok(Outcome::skipped("Validation unavailable")),
        })
    }

    fn run_chain(&self, skill: Arc<dyn Skill>, ctx: &ExecutionContext) -> Outcome {
        let name = skill.name().to_string();
        let endpoint = |ctx: &ExecutionContext| contain(skill.name(), || skill.execute(ctx));

        match panic::catch_unwind(AssertUnwindSafe(|| {
            Next::new(&name, &self.middleware, &endpoint).run(ctx)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(skill = %name, "✗ Middleware panicked");
                panic_outcome(payload)
            }
        }
    }

    fn not_found(&self, name: &str) -> Outcome {
        let available = self.index.list_names();
        let suggestions = suggest_similar(name, &available, self.config.max_suggestions);
        warn!(skill = %name, suggestions = ?suggestions, "Skill not found");

        Outcome::failure(format!("Skill not found: {}", name))
            .with_metadata("requested_skill", name)
            .with_metadata("available_skills", available)
            .with_metadata("suggestions", suggestions)
    }
}

/// Case-insensitive substring match in either direction, in index order.
pub fn suggest_similar(name: &str, available: &[String], max: usize) -> Vec<String> {
    let needle = name.to_lowercase();
    available
        .iter()
        .filter(|candidate| {
            let candidate = candidate.to_lowercase();
            candidate.contains(&needle) || needle.contains(&candidate)
        })
        .take(max)
        .cloned()
        .collect()
}

/// The safety boundary: turn `Err` and panics from skill code into outcomes.
fn contain<F>(skill: &str, call: F) -> Outcome
where
    F: FnOnce() -> Result<Outcome>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(Error::ContractViolation { expected, actual })) => {
            warn!(skill = %skill, expected = %expected, actual = %actual, "Skill broke the outcome contract");
            Outcome::failure(format!("Skill returned invalid type: {}", actual)).with_error_details(
                details([("expected_type", expected), ("actual_type", actual)]),
            )
        }
        Ok(Err(e)) => {
            error!(skill = %skill, error = %e, "✗ Skill execution failed with error");
            Outcome::failure(format!("Execution error: {}", e)).with_error_details(details([
                ("exception_type", e.kind().to_string()),
                ("exception_message", e.to_string()),
                ("traceback", error_trace(&e)),
            ]))
        }
        Err(payload) => {
            error!(skill = %skill, "✗ Skill panicked");
            panic_outcome(payload)
        }
    }
}

fn panic_outcome(payload: Box<dyn Any + Send>) -> Outcome {
    let message = panic_message(payload.as_ref());
    Outcome::failure(format!("Execution error: {}", message)).with_error_details(details([
        ("exception_type", Value::from("panic")),
        ("exception_message", Value::from(message)),
        ("traceback", Value::from(Backtrace::force_capture().to_string())),
    ]))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn error_trace(err: &Error) -> String {
    let mut trace = format!("{}: {}", err.kind(), err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        trace.push_str(&format!("\n  caused by: {}", cause));
        source = std::error::Error::source(cause);
    }
    trace.push_str("\n\n");
    trace.push_str(&Backtrace::force_capture().to_string());
    trace
}
