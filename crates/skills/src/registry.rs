use skilldock_core::{
    Config, Error, Paths, Result, ScriptLimits, Skill, SkillDescription, SkillsConfig,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::engine::ScriptEngine;
use crate::script::ScriptSkill;
use crate::signature::SignatureDescriptor;

/// Where a registered skill came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillOrigin {
    Script(PathBuf),
    /// Registered from Rust code; has no backing file.
    Native,
}

/// Registry entry. Immutable once built; `reload` replaces it wholesale.
#[derive(Clone)]
pub struct SkillRecord {
    name: String,
    origin: SkillOrigin,
    skill: Arc<dyn Skill>,
    signature: SignatureDescriptor,
    documentation: Option<String>,
}

impl SkillRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &SkillOrigin {
        &self.origin
    }

    pub fn source_location(&self) -> Option<&Path> {
        match &self.origin {
            SkillOrigin::Script(path) => Some(path),
            SkillOrigin::Native => None,
        }
    }

    pub fn skill(&self) -> &Arc<dyn Skill> {
        &self.skill
    }

    pub fn signature(&self) -> &SignatureDescriptor {
        &self.signature
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }
}

impl fmt::Debug for SkillRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRecord")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("signature", &self.signature.render())
            .field("documentation", &self.documentation)
            .finish()
    }
}

/// Read side of the registry, as seen by the orchestrator.
pub trait SkillIndex: Send + Sync {
    fn lookup(&self, name: &str) -> Option<SkillRecord>;

    fn list_names(&self) -> Vec<String>;
}

/// Name to skill index built by scanning directories of `.rhai` scripts.
pub struct SkillRegistry {
    entry_point: String,
    extension: String,
    engine: Arc<ScriptEngine>,
    skills: HashMap<String, SkillRecord>,
    load_errors: HashMap<String, String>,
}

impl SkillRegistry {
    pub fn new(skills: &SkillsConfig, limits: &ScriptLimits) -> Self {
        Self {
            entry_point: skills.entry_point.clone(),
            extension: skills.extension.clone(),
            engine: Arc::new(ScriptEngine::new(limits.clone())),
            skills: HashMap::new(),
            load_errors: HashMap::new(),
        }
    }

    /// Build a registry and scan the configured skills directory.
    pub fn from_config(config: &Config, paths: &Paths) -> Result<Self> {
        let mut registry = Self::new(&config.skills, &config.engine);
        registry.discover(&config.skills_dir(paths))?;
        Ok(registry)
    }

    /// Scan `dir` (non-recursively) and register every loadable skill.
    ///
    /// Per-file failures are recorded in [`Self::load_errors`] and never stop
    /// the scan. Returns the number of skills registered by this pass.
    pub fn discover(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "Skills directory not found: {}",
                dir.display()
            )));
        }

        let entries = std::fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
        let mut candidates: Vec<PathBuf> = readable_paths(dir, entries)
            .into_iter()
            .filter(|path| self.is_candidate(path))
            .collect();
        candidates.sort();

        let mut loaded = 0;
        let mut failed = 0;
        for path in candidates {
            let Some(name) = skill_name(&path) else {
                continue;
            };

            if let Some(existing) = self.skills.get(&name) {
                if existing.source_location() != Some(path.as_path()) {
                    let msg = format!(
                        "Duplicate skill name '{}': already registered from {}",
                        name,
                        describe_origin(existing.origin())
                    );
                    warn!(skill = %name, path = %path.display(), "{}", msg);
                    self.load_errors.insert(name, msg);
                    failed += 1;
                    continue;
                }
            }

            match self.load_script(&path) {
                Ok(record) => {
                    debug!(
                        skill = %name,
                        signature = %record.signature().render(),
                        complete = record.signature().is_complete(),
                        "Loaded skill"
                    );
                    self.load_errors.remove(&name);
                    self.skills.insert(name, record);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(skill = %name, path = %path.display(), error = %e, "⚠️ Failed to load skill");
                    self.load_errors.insert(name, e.to_string());
                    failed += 1;
                }
            }
        }

        info!(
            dir = %dir.display(),
            loaded,
            failed,
            "📦 Skill discovery finished"
        );
        Ok(loaded)
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            && skill_name(path).is_some_and(|n| !n.starts_with('_'))
    }

    fn load_script(&self, path: &Path) -> Result<SkillRecord> {
        let script = ScriptSkill::load(path, &self.entry_point, self.engine.clone())?;
        Ok(SkillRecord {
            name: script.name().to_string(),
            origin: SkillOrigin::Script(path.to_path_buf()),
            signature: script.signature().clone(),
            documentation: script.documentation().map(str::to_string),
            skill: Arc::new(script),
        })
    }

    /// Register a skill implemented in Rust.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Result<()> {
        let name = skill.name().to_string();
        if let Some(existing) = self.skills.get(&name) {
            return Err(Error::Validation(format!(
                "Duplicate skill name '{}': already registered from {}",
                name,
                describe_origin(existing.origin())
            )));
        }

        let documentation = skill
            .as_describable()
            .and_then(|d| d.describe().ok())
            .map(|d| d.summary)
            .filter(|s| !s.is_empty());

        debug!(skill = %name, "Registered native skill");
        self.skills.insert(
            name.clone(),
            SkillRecord {
                name,
                origin: SkillOrigin::Native,
                skill,
                signature: SignatureDescriptor::native(&self.entry_point),
                documentation,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.get(name)
    }

    pub fn lookup(&self, name: &str) -> Option<SkillRecord> {
        self.skills.get(name).cloned()
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.keys().cloned().collect();
        names.sort();
        names
    }

    /// Re-load the file behind `name`. The old record stays in place when
    /// the new load fails.
    pub fn reload(&mut self, name: &str) -> bool {
        let path = match self.skills.get(name).map(|r| r.origin().clone()) {
            Some(SkillOrigin::Script(path)) => path,
            Some(SkillOrigin::Native) => {
                warn!(skill = %name, "Native skills cannot be reloaded");
                return false;
            }
            None => {
                warn!(skill = %name, "Cannot reload unknown skill");
                return false;
            }
        };

        match self.load_script(&path) {
            Ok(record) => {
                info!(skill = %name, path = %path.display(), "🔄 Reloaded skill");
                self.skills.insert(name.to_string(), record);
                self.load_errors.remove(name);
                true
            }
            Err(e) => {
                warn!(skill = %name, error = %e, "Reload failed, keeping previous version");
                self.load_errors.insert(name.to_string(), e.to_string());
                false
            }
        }
    }

    /// Snapshot of per-file discovery and reload failures.
    pub fn load_errors(&self) -> BTreeMap<String, String> {
        self.load_errors
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Describable metadata, if the skill exposes it.
    pub fn describe(&self, name: &str) -> Option<Result<SkillDescription>> {
        self.skills
            .get(name)?
            .skill()
            .as_describable()
            .map(|d| d.describe())
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

fn skill_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn describe_origin(origin: &SkillOrigin) -> String {
    match origin {
        SkillOrigin::Script(path) => path.display().to_string(),
        SkillOrigin::Native => "native code".to_string(),
    }
}

impl SkillIndex for SkillRegistry {
    fn lookup(&self, name: &str) -> Option<SkillRecord> {
        SkillRegistry::lookup(self, name)
    }

    fn list_names(&self) -> Vec<String> {
        SkillRegistry::list_names(self)
    }
}

impl SkillIndex for RwLock<SkillRegistry> {
    fn lookup(&self, name: &str) -> Option<SkillRecord> {
        self.read().unwrap_or_else(|e| e.into_inner()).lookup(name)
    }

    fn list_names(&self) -> Vec<String> {
        self.read().unwrap_or_else(|e| e.into_inner()).list_names()
    }
}

/// Shared registry: many readers dispatching, one writer reloading.
pub type RegistryHandle = Arc<RwLock<SkillRegistry>>;

pub fn new_registry_handle(registry: SkillRegistry) -> RegistryHandle {
    Arc::new(RwLock::new(registry))
}

/// Paths of the directory entries that could be read. An unreadable entry
/// is logged and skipped.
fn readable_paths<I>(dir: &Path, entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .collect()
}
