use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Task execution priority levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(Error::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// Outcome status codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
    Partial,
    Skipped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Partial => "partial",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input handed to every skill execution.
///
/// Fields are private and there are no setters: wrappers and middleware all
/// observe exactly what the caller built. The builder methods consume `self`
/// and are meant for construction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionContext {
    task: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    priority: Priority,
}

impl ExecutionContext {
    /// Unchecked constructor. An empty task is caught by `try_new`,
    /// `from_json` and the validation wrapper.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            parameters: Map::new(),
            metadata: Map::new(),
            priority: Priority::default(),
        }
    }

    pub fn try_new(task: impl Into<String>) -> Result<Self> {
        let ctx = Self::new(task);
        ctx.validate()?;
        Ok(ctx)
    }

    /// Parse a context from JSON, rejecting unknown fields and an empty task.
    pub fn from_json(value: Value) -> Result<Self> {
        let ctx: ExecutionContext = serde_json::from_value(value)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Check the invariants that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.task.trim().is_empty() {
            return Err(Error::Validation("Context.task is required but empty".to_string()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "task": self.task,
            "parameters": self.parameters,
            "metadata": self.metadata,
            "priority": self.priority.as_str(),
        })
    }
}

/// Uniform result record produced once per dispatch.
///
/// `metadata` accumulates annotations as the outcome travels back out
/// through wrappers and middleware; each layer writes after its inner layer
/// has returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Map<String, Value>>,
}

impl Outcome {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            data: None,
            message: message.into(),
            metadata: Map::new(),
            error_details: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Status::Success, message)
    }

    pub fn partial(message: impl Into<String>) -> Self {
        Self::new(Status::Partial, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Status::Failure, message)
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::new(Status::Skipped, message)
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotate(key, value);
        self
    }

    /// Attach error details. Ignored unless the status is FAILURE.
    pub fn with_error_details(mut self, details: Map<String, Value>) -> Self {
        if self.status == Status::Failure {
            self.error_details = Some(details);
        }
        self
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// SUCCESS and PARTIAL count as success.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Status::Success | Status::Partial)
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn error_detail(&self, key: &str) -> Option<&Value> {
        self.error_details.as_ref().and_then(|d| d.get(key))
    }
}

/// Build a JSON object map from `(key, value)` pairs.
pub fn details<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
