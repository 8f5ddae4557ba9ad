//! Contracts a dispatchable unit satisfies.
//!
//! [`Skill`] is the only shape the orchestrator needs. [`Validatable`] and
//! [`Describable`] are optional and reached through the `as_*` accessors on a
//! `dyn Skill`. [`StreamingSkill`] and [`AsyncSkill`] are reserved shapes for
//! incremental and non-blocking execution; the synchronous dispatch path does
//! not use them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ExecutionContext, Outcome};

/// A single-argument unit taking a context and producing an outcome.
///
/// Expected failures are reported as a FAILURE outcome. `Err` is reserved for
/// faults; the orchestrator converts those (and panics) into FAILURE outcomes
/// at its safety boundary.
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome>;

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        None
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        None
    }
}

/// Validation-only entry point: inspects the context without side effects.
pub trait Validatable: Send + Sync {
    fn validate(&self, ctx: &ExecutionContext) -> Result<Outcome>;
}

/// Metadata entry point used for documentation and CLI help.
pub trait Describable: Send + Sync {
    fn describe(&self) -> Result<SkillDescription>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SkillDescription {
    #[serde(default)]
    pub summary: String,
    /// Parameter schema, keyed by parameter name.
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl<S: Skill + ?Sized> Skill for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        (**self).execute(ctx)
    }

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        (**self).as_validatable()
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        (**self).as_describable()
    }
}

impl<S: Skill + ?Sized> Skill for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        (**self).execute(ctx)
    }

    fn as_validatable(&self) -> Option<&dyn Validatable> {
        (**self).as_validatable()
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        (**self).as_describable()
    }
}

/// A native skill backed by a closure.
pub struct FnSkill<F> {
    name: String,
    func: F,
}

impl<F> Skill for FnSkill<F>
where
    F: Fn(&ExecutionContext) -> Result<Outcome> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        (self.func)(ctx)
    }
}

pub fn skill_fn<F>(name: impl Into<String>, func: F) -> FnSkill<F>
where
    F: Fn(&ExecutionContext) -> Result<Outcome> + Send + Sync,
{
    FnSkill {
        name: name.into(),
        func,
    }
}

pub type OutcomeStream<'a> = Box<dyn Iterator<Item = Result<Outcome>> + Send + 'a>;

/// Streaming shape: yields outcomes incrementally for chunked work.
pub trait StreamingSkill: Send + Sync {
    fn stream_name(&self) -> &str;

    fn execute_stream<'a>(&'a self, ctx: &'a ExecutionContext) -> OutcomeStream<'a>;
}

/// Adapts a synchronous skill into a stream of exactly one outcome.
pub struct SingleShot<S>(pub S);

impl<S: Skill> StreamingSkill for SingleShot<S> {
    fn stream_name(&self) -> &str {
        self.0.name()
    }

    fn execute_stream<'a>(&'a self, ctx: &'a ExecutionContext) -> OutcomeStream<'a> {
        Box::new(std::iter::once_with(move || self.0.execute(ctx)))
    }
}

/// Asynchronous shape. Every [`Skill`] is usable here; it runs inline.
#[async_trait]
pub trait AsyncSkill: Send + Sync {
    async fn execute_async(&self, ctx: &ExecutionContext) -> Result<Outcome>;
}

#[async_trait]
impl<S: Skill + ?Sized> AsyncSkill for S {
    async fn execute_async(&self, ctx: &ExecutionContext) -> Result<Outcome> {
        self.execute(ctx)
    }
}
