use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Skill error: {0}")]
    Skill(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A unit returned something that is not an [`crate::Outcome`].
    #[error("Skill returned invalid type: {actual} (expected {expected})")]
    ContractViolation { expected: String, actual: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short variant name, reported as `exception_type` when a fault is
    /// converted into an outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Yaml(_) => "YamlError",
            Error::Script(_) => "ScriptError",
            Error::Skill(_) => "SkillError",
            Error::Load(_) => "LoadError",
            Error::Validation(_) => "ValidationError",
            Error::NotFound(_) => "NotFoundError",
            Error::ContractViolation { .. } => "ContractViolation",
            Error::Other(_) => "Error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
