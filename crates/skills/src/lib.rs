pub mod cache;
pub mod convert;
pub mod engine;
pub mod registry;
pub mod script;
pub mod signature;
pub mod wrappers;

pub use cache::{cache_key, ResponseCache};
pub use engine::ScriptEngine;
pub use registry::{
    new_registry_handle, RegistryHandle, SkillIndex, SkillOrigin, SkillRecord, SkillRegistry,
};
pub use script::ScriptSkill;
pub use signature::{check_signature, SignatureDescriptor, CONTEXT_TYPE, OUTCOME_TYPE};
pub use wrappers::{
    backoff_delay, Cached, Enriched, Logged, RequireParams, Retry, SkillExt, SleepFn, Timed,
    Validated,
};
