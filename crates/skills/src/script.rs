use rhai::AST;
use skilldock_core::{
    Describable, Error, ExecutionContext, Outcome, Result, Skill, SkillDescription, Validatable,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::convert::{context_to_map, description_from_dynamic, outcome_from_dynamic};
use crate::engine::ScriptEngine;
use crate::signature::{has_function, inspect_entry_point, SignatureDescriptor};

const VALIDATE_FN: &str = "validate";
const DESCRIBE_FN: &str = "describe";

/// A skill backed by a compiled Rhai script.
pub struct ScriptSkill {
    name: String,
    path: PathBuf,
    entry_point: String,
    ast: AST,
    engine: Arc<ScriptEngine>,
    signature: SignatureDescriptor,
    documentation: Option<String>,
    has_validate: bool,
    has_describe: bool,
}

impl ScriptSkill {
    /// Read, compile, initialise and signature-check a script.
    ///
    /// The skill name is the file stem.
    pub fn load(path: &Path, entry_point: &str, engine: Arc<ScriptEngine>) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Load(format!("Invalid skill file name: {}", path.display())))?
            .to_string();

        let script = std::fs::read_to_string(path)
            .map_err(|e| Error::Load(format!("Failed to read script file: {}", e)))?;

        let ast = engine.compile(&script)?;
        engine.initialise(&ast)?;
        let (signature, documentation) = inspect_entry_point(&ast, entry_point)?;

        let has_validate = has_function(&ast, VALIDATE_FN, 1);
        let has_describe = has_function(&ast, DESCRIBE_FN, 0);

        debug!(
            skill = %name,
            path = %path.display(),
            validate = has_validate,
            describe = has_describe,
            "Loaded skill script"
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            entry_point: entry_point.to_string(),
            ast,
            engine,
            signature,
            documentation,
            has_validate,
            has_describe,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn signature(&self) -> &SignatureDescriptor {
        &self.signature
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }
}

impl Skill for ScriptSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let value = self
            .engine
            .call(&self.ast, &self.entry_point, (context_to_map(ctx),))?;
        outcome_from_dynamic(value)
    }

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        if self.has_validate {
            Some(self)
        } else {
            None
        }
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        if self.has_describe {
            Some(self)
        } else {
            None
        }
    }
}

impl Validatable for ScriptSkill {
    fn validate(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        let value = self
            .engine
            .call(&self.ast, VALIDATE_FN, (context_to_map(ctx),))?;
        outcome_from_dynamic(value)
    }
}

impl Describable for ScriptSkill {
    fn describe(&self) -> Result<SkillDescription> {
        let value = self.engine.call(&self.ast, DESCRIBE_FN, ())?;
        description_from_dynamic(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skilldock_core::Status;

    fn write(dir: &Path, file: &str, body: &str) -> PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_execute_script_skill() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "greet.rhai",
            r#"
            /// Greets someone by name.
            fn execute(ctx) {
                let who = ctx.parameters.name ?? "world";
                success(#{ greeting: "Hello, " + who }, "greeted")
            }
            "#,
        );
        let skill = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default())).unwrap();
        assert_eq!(skill.name(), "greet");
        assert_eq!(skill.documentation(), Some("Greets someone by name."));

        let ctx = ExecutionContext::new("greet").with_parameter("name", "Ada");
        let out = skill.execute(&ctx).unwrap();
        assert_eq!(out.status, Status::Success);
        assert_eq!(out.data, Some(json!({"greeting": "Hello, Ada"})));
        assert_eq!(out.message, "greeted");
    }

    #[test]
    fn test_script_returning_number_is_contract_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "num.rhai", "fn execute(ctx) { 42 }");
        let skill = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default())).unwrap();
        match skill.execute(&ExecutionContext::new("num")) {
            Err(Error::ContractViolation { actual, .. }) => assert_eq!(actual, "i64"),
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[test]
    fn test_script_throw_is_fault() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "boom.rhai", r#"fn execute(ctx) { throw "kaboom"; }"#);
        let skill = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default())).unwrap();
        let err = skill.execute(&ExecutionContext::new("boom")).unwrap_err();
        assert!(matches!(err, Error::Script(_)));
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn test_optional_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "sum.rhai",
            r#"
            fn execute(ctx) { success(ctx.parameters.a + ctx.parameters.b, "summed") }
            fn validate(ctx) {
                if "a" in ctx.parameters && "b" in ctx.parameters { success("valid") }
                else { failure("a and b are required") }
            }
            fn describe() {
                #{ summary: "Adds a and b", tags: ["math"], version: "1.2.0",
                   parameters: #{ a: #{ type: "int" }, b: #{ type: "int" } } }
            }
            "#,
        );
        let skill = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default())).unwrap();

        let validator = skill.as_validatable().unwrap();
        let bad = validator.validate(&ExecutionContext::new("sum")).unwrap();
        assert_eq!(bad.status, Status::Failure);
        let ok = validator
            .validate(&ExecutionContext::new("sum").with_parameter("a", 1).with_parameter("b", 2))
            .unwrap();
        assert!(ok.is_success());

        let desc = skill.as_describable().unwrap().describe().unwrap();
        assert_eq!(desc.summary, "Adds a and b");
        assert_eq!(desc.version.as_deref(), Some("1.2.0"));
        assert_eq!(desc.parameters["a"]["type"], "int");
    }

    #[test]
    fn test_top_level_runs_once_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "slow_init.rhai",
            r#"
            sleep_ms(200);
            fn execute(ctx) { success("ready") }
            "#,
        );

        let start = std::time::Instant::now();
        let skill = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default())).unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(200));

        for _ in 0..2 {
            let start = std::time::Instant::now();
            assert!(skill.execute(&ExecutionContext::new("t")).unwrap().is_success());
            assert!(start.elapsed() < std::time::Duration::from_millis(150));
        }
    }

    #[test]
    fn test_missing_entry_point_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "noop.rhai", "fn run(ctx) { 1 }");
        let err = ScriptSkill::load(&path, "execute", Arc::new(ScriptEngine::default()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }
}
