use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsConfig {
    /// Overrides `~/.skilldock/skills` when set.
    #[serde(default)]
    pub dir: Option<String>,
    /// Name of the entry function every skill script must define.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_entry_point() -> String {
    "execute".to_string()
}

fn default_extension() -> String {
    "rhai".to_string()
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            entry_point: default_entry_point(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default = "default_true")]
    pub enable_timing: bool,
    #[serde(default = "default_true")]
    pub enable_logging: bool,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_suggestions() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_timing: true,
            enable_logging: true,
            max_suggestions: default_max_suggestions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Execution budgets applied to every skill script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLimits {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
    #[serde(default = "default_max_collection_size")]
    pub max_array_size: usize,
    #[serde(default = "default_max_collection_size")]
    pub max_map_size: usize,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_string_size() -> usize {
    1_000_000
}

fn default_max_collection_size() -> usize {
    10_000
}

fn default_max_call_depth() -> usize {
    64
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            timeout_secs: default_timeout_secs(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_collection_size(),
            max_map_size: default_max_collection_size(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub engine: ScriptLimits,
}

impl Config {
    /// Load from JSON, or YAML when the file extension says so.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        let config: Config = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Skills directory, honouring `skills.dir` and expanding a leading `~/`.
    pub fn skills_dir(&self, paths: &Paths) -> PathBuf {
        match self.skills.dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => {
                if let Some(rest) = dir.strip_prefix("~/") {
                    if let Some(home) = dirs::home_dir() {
                        return home.join(rest);
                    }
                }
                PathBuf::from(dir)
            }
            _ => paths.skills_dir(),
        }
    }
}
