use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST};
use serde_json::Value;
use skilldock_core::{Error, Result, ScriptLimits};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::convert::{dynamic_to_json, json_to_dynamic};

/// Embedded Rhai engine shared by every script skill of a registry.
///
/// A fresh [`Engine`] is built per call so that each run gets its own
/// operation counter and deadline.
pub struct ScriptEngine {
    limits: ScriptLimits,
}

impl ScriptEngine {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    fn create_engine(&self) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_string_size(self.limits.max_string_size);
        engine.set_max_array_size(self.limits.max_array_size);
        engine.set_max_map_size(self.limits.max_map_size);
        engine.set_max_call_levels(self.limits.max_call_depth);
        engine.set_max_expr_depths(64, 64);

        register_helpers(&mut engine);
        engine
    }

    fn create_engine_with_limits(&self) -> (Engine, Arc<AtomicU64>, Instant) {
        let mut engine = self.create_engine();

        let operations = Arc::new(AtomicU64::new(0));
        let start_time = Instant::now();
        let max_ops = self.limits.max_operations;
        let timeout = Duration::from_secs(self.limits.timeout_secs);

        let ops_counter = operations.clone();
        engine.on_progress(move |_| {
            let count = ops_counter.fetch_add(1, Ordering::Relaxed);
            if count >= max_ops {
                return Some(Dynamic::from(format!(
                    "Operation limit exceeded: {} operations",
                    max_ops
                )));
            }
            if start_time.elapsed() > timeout {
                return Some(Dynamic::from(format!(
                    "Timeout exceeded: {} seconds",
                    timeout.as_secs()
                )));
            }
            None
        });

        (engine, operations, start_time)
    }

    pub fn compile(&self, script: &str) -> Result<AST> {
        self.create_engine()
            .compile(script)
            .map_err(|e| Error::Load(format!("Compilation error: {}", e)))
    }

    /// Run the top-level statements of a script once, as module initialisation.
    pub fn initialise(&self, ast: &AST) -> Result<()> {
        let (engine, operations, start_time) = self.create_engine_with_limits();
        let mut scope = Scope::new();
        let result = engine.run_ast_with_scope(&mut scope, ast);

        debug!(
            operations = operations.load(Ordering::Relaxed),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Rhai module initialisation completed"
        );

        result.map_err(|e| Error::Load(format!("Initialisation failed: {}", describe_error(&e))))
    }

    /// Call a script function by name. Top-level statements are not run
    /// again; that happens once in [`ScriptEngine::initialise`].
    pub fn call(&self, ast: &AST, function: &str, args: impl FuncArgs) -> Result<Dynamic> {
        let (engine, operations, start_time) = self.create_engine_with_limits();
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false);
        let result = engine.call_fn_with_options::<Dynamic>(options, &mut scope, ast, function, args);

        debug!(
            function = %function,
            operations = operations.load(Ordering::Relaxed),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Rhai function call completed"
        );

        result.map_err(|e| {
            if let EvalAltResult::ErrorTerminated(ref reason, _) = *e {
                warn!(reason = %reason, function = %function, "Script terminated");
                return Error::Script(format!("Script terminated: {}", reason));
            }
            Error::Script(format!("Runtime error: {}", describe_error(&e)))
        })
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

fn describe_error(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, pos) => format!("{} ({})", value, pos),
        other => other.to_string(),
    }
}

fn outcome_map(status: &str, data: Dynamic, message: String) -> Map {
    let mut map = Map::new();
    map.insert("status".into(), Dynamic::from(status.to_string()));
    map.insert("data".into(), data);
    map.insert("message".into(), Dynamic::from(message));
    map.insert("metadata".into(), Dynamic::from(Map::new()));
    map
}

const MAX_SLEEP_MS: i64 = 10_000;

/// Functions available to every skill script.
fn register_helpers(engine: &mut Engine) {
    engine.register_fn("success", |data: Dynamic, message: String| -> Map {
        outcome_map("success", data, message)
    });
    engine.register_fn("success", |message: String| -> Map {
        outcome_map("success", Dynamic::UNIT, message)
    });
    engine.register_fn("partial", |data: Dynamic, message: String| -> Map {
        outcome_map("partial", data, message)
    });
    engine.register_fn("failure", |message: String| -> Map {
        outcome_map("failure", Dynamic::UNIT, message)
    });
    engine.register_fn("failure_with", |message: String, details: Map| -> Map {
        let mut map = outcome_map("failure", Dynamic::UNIT, message);
        map.insert("error_details".into(), Dynamic::from(details));
        map
    });
    engine.register_fn("skipped", |message: String| -> Map {
        outcome_map("skipped", Dynamic::UNIT, message)
    });

    engine.register_fn("log", |msg: String| {
        info!(source = "skill", "{}", msg);
    });
    engine.register_fn("log_warn", |msg: String| {
        warn!(source = "skill", "{}", msg);
    });

    engine.register_fn("timestamp", || -> i64 { chrono::Utc::now().timestamp() });

    engine.register_fn("sleep_ms", |ms: i64| -> std::result::Result<(), Box<EvalAltResult>> {
        if !(0..=MAX_SLEEP_MS).contains(&ms) {
            return Err(format!("sleep_ms: {} is outside 0..={} ms", ms, MAX_SLEEP_MS).into());
        }
        std::thread::sleep(Duration::from_millis(ms as u64));
        Ok(())
    });

    engine.register_fn("to_json", |val: Dynamic| -> String {
        serde_json::to_string(&dynamic_to_json(&val)).unwrap_or_default()
    });
    engine.register_fn("from_json", |s: String| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
        serde_json::from_str::<Value>(&s)
            .map(|v| json_to_dynamic(&v))
            .map_err(|e| format!("from_json: {}", e).into())
    });
}
