use serde_json::{json, Value};
use skilldock_core::{
    skill_fn, Config, ExecutionContext, OrchestratorConfig, Outcome, Priority, Result, Skill,
    Status,
};
use skilldock_orchestrator::{CachingMiddleware, LoggingMiddleware, Orchestrator};
use skilldock_skills::{new_registry_handle, ResponseCache, SkillExt, SkillRegistry};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SUM: &str = r#"
/// Adds up `parameters.values`.
/// @param ctx ExecutionContext
/// @returns Outcome
fn execute(ctx) {
    let values = ctx.parameters.values ?? [];
    if values.len() == 0 {
        return failure_with("no values given", #{ field: "values" });
    }
    let total = 0;
    for v in values { total += v; }
    success(#{ total: total, count: values.len() }, "summed " + values.len() + " values")
}

fn validate(ctx) {
    if "values" in ctx.parameters { success("ok") } else { failure("values is required") }
}

fn describe() {
    #{ summary: "Sum a list of integers", tags: ["math"], version: "1.0.0",
       parameters: #{ values: #{ type: "array" } } }
}
"#;

const THROWS: &str = r#"
fn execute(ctx) {
    throw "database unavailable";
}
"#;

const WRONG_TYPE: &str = r#"
fn execute(ctx) {
    42
}
"#;

const DOWN: &str = r#"
fn execute(ctx) {
    failure("service down")
}
"#;

const BROKEN_ON_LOAD: &str = r#"
throw "missing dependency";

fn execute(ctx) {
    success("unreachable")
}
"#;

fn write(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), body).unwrap();
}

fn skills_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sum.rhai", SUM);
    write(dir.path(), "throws.rhai", THROWS);
    write(dir.path(), "wrong_type.rhai", WRONG_TYPE);
    write(dir.path(), "down.rhai", DOWN);
    write(dir.path(), "_shared.rhai", "fn helper() { 1 }");
    dir
}

fn registry(dir: &Path) -> SkillRegistry {
    let config = Config::default();
    let mut reg = SkillRegistry::new(&config.skills, &config.engine);
    reg.discover(dir).unwrap();
    reg
}

fn orchestrator(dir: &Path) -> Orchestrator {
    Orchestrator::new(Arc::new(registry(dir)), OrchestratorConfig::default())
}

fn sum_ctx(values: Value) -> ExecutionContext {
    ExecutionContext::new("sum").with_parameter("values", values)
}

#[test]
fn test_dispatch_script_skill() {
    let dir = skills_dir();
    let orch = orchestrator(dir.path());
    assert_eq!(orch.available_skills(), vec!["down", "sum", "throws", "wrong_type"]);

    let out = orch.execute("sum", &sum_ctx(json!([1, 2, 3])));
    assert_eq!(out.status, Status::Success);
    assert_eq!(out.data, Some(json!({"total": 6, "count": 3})));
    assert_eq!(out.message, "summed 3 values");
    assert_eq!(out.meta("skill_name"), Some(&json!("sum")));

    let out = orch.execute("sum", &sum_ctx(json!([])));
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.error_detail("field"), Some(&json!("values")));
}

#[test]
fn test_execute_never_raises_on_script_error() {
    let dir = skills_dir();
    let orch = orchestrator(dir.path());
    let out = orch.execute("throws", &ExecutionContext::new("anything"));
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.error_detail("exception_type"), Some(&json!("ScriptError")));
    let message = out.error_detail("exception_message").and_then(Value::as_str).unwrap();
    assert!(message.contains("database unavailable"));
    assert!(out.error_detail("traceback").is_some());
}

#[test]
fn test_missing_skill_reports_known_names() {
    let dir = skills_dir();
    let orch = orchestrator(dir.path());
    let out = orch.execute("summ", &ExecutionContext::new("t"));
    assert_eq!(out.status, Status::Failure);
    assert!(out.message.contains("summ"));
    assert_eq!(
        out.meta("available_skills"),
        Some(&json!(["down", "sum", "throws", "wrong_type"]))
    );
    assert_eq!(out.meta("suggestions"), Some(&json!(["sum"])));
}

#[test]
fn test_non_outcome_return_names_actual_type() {
    let dir = skills_dir();
    let orch = orchestrator(dir.path());
    let out = orch.execute("wrong_type", &ExecutionContext::new("t"));
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.error_detail("expected_type"), Some(&json!("Outcome")));
    assert_eq!(out.error_detail("actual_type"), Some(&json!("i64")));
}

#[test]
fn test_timing_wrapper_on_discovered_skill() {
    let dir = skills_dir();
    let reg = registry(dir.path());
    for name in ["sum", "down"] {
        let timed = reg.lookup(name).unwrap().skill().clone().timed();
        let out = timed.execute(&sum_ctx(json!([1]))).unwrap();
        let ms = out.meta("execution_time_ms").and_then(Value::as_f64).unwrap();
        assert!(ms >= 0.0);
    }
}

#[test]
fn test_caching_wrapper_on_discovered_skill() {
    let dir = skills_dir();
    let reg = registry(dir.path());
    let cached = reg
        .lookup("sum")
        .unwrap()
        .skill()
        .clone()
        .cached(Duration::from_millis(200));

    let a = ExecutionContext::new("sum")
        .with_parameter("values", json!([4, 5]))
        .with_parameter("label", "x");
    let b = ExecutionContext::new("sum")
        .with_parameter("label", "x")
        .with_parameter("values", json!([4, 5]));

    let first = cached.execute(&a).unwrap();
    let second = cached.execute(&b).unwrap();
    assert_eq!(first.meta("cache_hit"), Some(&json!(false)));
    assert_eq!(second.meta("cache_hit"), Some(&json!(true)));
    assert_eq!(second.data, first.data);

    std::thread::sleep(Duration::from_millis(300));
    let third = cached.execute(&a).unwrap();
    assert_eq!(third.meta("cache_hit"), Some(&json!(false)));
}

#[test]
fn test_retry_counts_invocations_of_failing_script() {
    let dir = skills_dir();
    let reg = registry(dir.path());
    let down = reg.lookup("down").unwrap().skill().clone();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let counted = skill_fn("down", move |ctx: &ExecutionContext| -> Result<Outcome> {
        counter.fetch_add(1, Ordering::SeqCst);
        down.execute(ctx)
    });

    let out = counted
        .retry(3, Duration::from_millis(1))
        .execute(&ExecutionContext::new("t"))
        .unwrap();
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.meta("all_attempts_failed"), Some(&json!(true)));
    assert_eq!(out.message, "service down (failed after 3 attempts)");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_required_params_gate_script() {
    let dir = skills_dir();
    let reg = registry(dir.path());
    let sum = reg.lookup("sum").unwrap().skill().clone();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let gated = skill_fn("sum", move |ctx: &ExecutionContext| -> Result<Outcome> {
        counter.fetch_add(1, Ordering::SeqCst);
        sum.execute(ctx)
    })
    .require_params(["a", "b"]);

    let out = gated
        .execute(&ExecutionContext::new("t").with_parameter("a", 1))
        .unwrap();
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.error_detail("missing_params"), Some(&json!(["b"])));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wrapped_skills_dispatch_through_orchestrator() {
    let dir = skills_dir();
    let discovered = registry(dir.path());

    let config = Config::default();
    let mut reg = SkillRegistry::new(&config.skills, &config.engine);
    for name in discovered.list_names() {
        let skill = discovered.lookup(&name).unwrap().skill().clone();
        reg.register(Arc::new(skill.standard())).unwrap();
    }
    let orch = Orchestrator::new(Arc::new(reg), OrchestratorConfig::default());

    let out = orch.execute("sum", &ExecutionContext::new(""));
    assert_eq!(out.status, Status::Failure);
    assert_eq!(out.error_detail("wrapper"), Some(&json!("validate_context")));

    let out = orch.execute("sum", &sum_ctx(json!([2, 2])));
    assert!(out.is_success());
    assert!(out.meta("execution_timestamp").is_some());
}

#[test]
fn test_batch_stops_at_failed_critical_item() {
    let dir = skills_dir();
    let orch = orchestrator(dir.path());
    let outcomes = orch.execute_batch(vec![
        ("down", ExecutionContext::new("a")),
        ("throws", ExecutionContext::new("b").with_priority(Priority::Critical)),
        ("sum", sum_ctx(json!([1]))),
    ]);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, Status::Failure);
    assert_eq!(outcomes[1].status, Status::Failure);
}

#[test]
fn test_discovery_resilience() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.rhai", SUM);
    write(dir.path(), "bad.rhai", BROKEN_ON_LOAD);

    let reg = registry(dir.path());
    assert_eq!(reg.list_names(), vec!["good"]);
    let errors = reg.load_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors["bad"].contains("missing dependency"));
}

#[test]
fn test_middleware_over_scripts() {
    let dir = skills_dir();
    let mut orch = orchestrator(dir.path());
    let cache = ResponseCache::new();
    orch.add_middleware(LoggingMiddleware);
    orch.add_middleware(CachingMiddleware::new(cache.clone(), Duration::from_secs(60)));

    let first = orch.execute("sum", &sum_ctx(json!([1, 2])));
    let second = orch.execute("sum", &sum_ctx(json!([1, 2])));
    assert!(first.meta("cache_hit").is_none());
    assert_eq!(second.meta("cache_hit"), Some(&json!(true)));
    assert_eq!(second.data, first.data);

    orch.execute("down", &ExecutionContext::new("other"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_validate_and_describe_shapes() {
    let dir = skills_dir();
    let reg = registry(dir.path());
    let description = reg.describe("sum").unwrap().unwrap();
    assert_eq!(description.summary, "Sum a list of integers");
    assert!(reg.describe("down").is_none());

    let orch = Orchestrator::new(Arc::new(reg), OrchestratorConfig::default());
    assert_eq!(orch.validate("sum", &ExecutionContext::new("t")).status, Status::Failure);
    assert!(orch.validate("sum", &sum_ctx(json!([1]))).is_success());
    assert_eq!(orch.validate("down", &ExecutionContext::new("t")).status, Status::Skipped);
}

#[test]
fn test_reload_through_shared_handle() {
    let dir = skills_dir();
    let handle = new_registry_handle(registry(dir.path()));
    let orch = Orchestrator::new(handle.clone(), OrchestratorConfig::default());

    assert_eq!(orch.execute("down", &ExecutionContext::new("t")).status, Status::Failure);

    write(dir.path(), "down.rhai", r#"fn execute(ctx) { success("back up") }"#);
    assert!(handle.write().unwrap().reload("down"));
    let out = orch.execute("down", &ExecutionContext::new("t"));
    assert_eq!(out.message, "back up");
}
