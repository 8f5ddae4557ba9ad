pub mod config_cmd;
pub mod run_cmd;
pub mod skills;

use serde_json::{Map, Value};
use skilldock_core::{Config, Paths};
use skilldock_skills::SkillRegistry;
use std::path::PathBuf;

/// Loaded configuration plus the registry built from the skills directory.
pub struct Workspace {
    pub config: Config,
    pub skills_dir: PathBuf,
    pub registry: SkillRegistry,
}

pub fn load_workspace(skills_dir: Option<PathBuf>) -> anyhow::Result<Workspace> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let skills_dir = skills_dir.unwrap_or_else(|| config.skills_dir(&paths));

    let mut registry = SkillRegistry::new(&config.skills, &config.engine);
    registry.discover(&skills_dir).map_err(|e| {
        anyhow::anyhow!(
            "{}\nCreate the directory or pass --skills-dir <path>.",
            e
        )
    })?;

    Ok(Workspace {
        config,
        skills_dir,
        registry,
    })
}

/// Parse `--params`, which must be a JSON object.
pub fn parse_params(params: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    let Some(raw) = params else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => anyhow::bail!("--params must be a JSON object, got: {}", other),
        Err(e) => anyhow::bail!("Failed to parse JSON params: {}\nInput: {}", e, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        assert!(parse_params(None).unwrap().is_empty());
        let map = parse_params(Some(r#"{"a": 1}"#)).unwrap();
        assert_eq!(map["a"], 1);
        assert!(parse_params(Some("[1, 2]")).is_err());
        assert!(parse_params(Some("{oops")).is_err());
    }
}
