pub mod config;
pub mod error;
pub mod paths;
pub mod skill;
pub mod types;

pub use config::{CacheConfig, Config, OrchestratorConfig, RetryConfig, ScriptLimits, SkillsConfig};
pub use error::{Error, Result};
pub use paths::Paths;
pub use skill::{
    skill_fn, AsyncSkill, Describable, FnSkill, OutcomeStream, SingleShot, Skill,
    SkillDescription, StreamingSkill, Validatable,
};
pub use types::{details, ExecutionContext, Outcome, Priority, Status};
