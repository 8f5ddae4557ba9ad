//! Discovery-time acceptance check for a skill's entry point.
//!
//! Rhai has no type annotations, so parameter and return types are declared in
//! the entry function's doc comment:
//!
//! ```text
//! /// Sums the `values` parameter.
//! /// @param ctx ExecutionContext
//! /// @returns Outcome
//! fn execute(ctx) { ... }
//! ```
//!
//! Annotations are advisory. A missing one is accepted and reported as
//! incomplete; a wrong one rejects the skill.

use rhai::{FnAccess, AST};
use serde::Serialize;
use skilldock_core::{Error, Result};
use tracing::info;

pub const CONTEXT_TYPE: &str = "ExecutionContext";
pub const OUTCOME_TYPE: &str = "Outcome";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureDescriptor {
    pub entry_point: String,
    pub params: Vec<String>,
    pub param_type: Option<String>,
    pub return_type: Option<String>,
}

impl SignatureDescriptor {
    /// Descriptor for a unit implemented in Rust, where the compiler already
    /// enforces the types.
    pub fn native(entry_point: &str) -> Self {
        Self {
            entry_point: entry_point.to_string(),
            params: vec!["ctx".to_string()],
            param_type: Some(CONTEXT_TYPE.to_string()),
            return_type: Some(OUTCOME_TYPE.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.param_type.is_some() && self.return_type.is_some()
    }

    pub fn render(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| match &self.param_type {
                Some(ty) => format!("{}: {}", p, ty),
                None => p.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        match &self.return_type {
            Some(ret) => format!("{}({}) -> {}", self.entry_point, params, ret),
            None => format!("{}({})", self.entry_point, params),
        }
    }
}

/// Doc comment of a script function, split into prose and `@` tags.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocComment {
    pub text: Option<String>,
    pub param_types: Vec<(String, String)>,
    pub return_type: Option<String>,
}

pub fn parse_doc_comment<'a>(lines: impl IntoIterator<Item = &'a str>) -> DocComment {
    let mut doc = DocComment::default();
    let mut prose = Vec::new();

    for raw in lines {
        for line in raw.lines() {
            let line = line
                .trim()
                .trim_start_matches("/**")
                .trim_start_matches("///")
                .trim_end_matches("*/")
                .trim()
                .trim_start_matches('*')
                .trim();

            if let Some(rest) = line.strip_prefix("@param") {
                let mut parts = rest.split(|c: char| c.is_whitespace() || c == ':').filter(|s| !s.is_empty());
                if let (Some(name), Some(ty)) = (parts.next(), parts.next()) {
                    doc.param_types.push((name.to_string(), ty.to_string()));
                }
            } else if let Some(rest) = line
                .strip_prefix("@returns")
                .or_else(|| line.strip_prefix("@return"))
            {
                let ty = rest.trim();
                if !ty.is_empty() {
                    doc.return_type = Some(ty.to_string());
                }
            } else if !line.is_empty() {
                prose.push(line.to_string());
            }
        }
    }

    if !prose.is_empty() {
        doc.text = Some(prose.join("\n"));
    }
    doc
}

/// The acceptance rule: exactly one parameter, and any declared types must be
/// the contract types.
pub fn check_signature(sig: &SignatureDescriptor) -> Result<()> {
    if sig.params.len() != 1 {
        return Err(Error::Validation(format!(
            "Invalid signature {}: expected exactly one parameter, found {}",
            sig.render(),
            sig.params.len()
        )));
    }
    if let Some(ty) = sig.param_type.as_deref() {
        if ty != CONTEXT_TYPE {
            return Err(Error::Validation(format!(
                "Invalid signature {}: parameter must be {}",
                sig.render(),
                CONTEXT_TYPE
            )));
        }
    }
    if let Some(ty) = sig.return_type.as_deref() {
        if ty != OUTCOME_TYPE {
            return Err(Error::Validation(format!(
                "Invalid signature {}: return type must be {}",
                sig.render(),
                OUTCOME_TYPE
            )));
        }
    }
    Ok(())
}

/// Locate `entry_point` in a compiled script and validate its shape.
///
/// Returns the descriptor and the prose part of the doc comment.
pub fn inspect_entry_point(ast: &AST, entry_point: &str) -> Result<(SignatureDescriptor, Option<String>)> {
    let candidates: Vec<_> = ast
        .iter_functions()
        .filter(|f| f.name == entry_point)
        .collect();

    if candidates.is_empty() {
        return Err(Error::Validation(format!(
            "No '{}' function found",
            entry_point
        )));
    }

    // Rhai overloads by arity; prefer the single-parameter overload.
    let func = candidates
        .iter()
        .find(|f| f.params.len() == 1)
        .unwrap_or(&candidates[0]);

    if matches!(func.access, FnAccess::Private) {
        return Err(Error::Validation(format!(
            "'{}' is private and cannot be dispatched",
            entry_point
        )));
    }

    let doc = parse_doc_comment(func.comments.iter().copied());
    let params: Vec<String> = func.params.iter().map(|p| p.to_string()).collect();
    let param_type = params.first().and_then(|name| {
        doc.param_types
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty.clone())
    });

    let sig = SignatureDescriptor {
        entry_point: entry_point.to_string(),
        params,
        param_type,
        return_type: doc.return_type.clone(),
    };

    check_signature(&sig)?;

    if sig.return_type.is_none() {
        info!(entry_point = %entry_point, "ℹ Missing return type annotation, consider `/// @returns {}`", OUTCOME_TYPE);
    }
    if sig.param_type.is_none() {
        info!(entry_point = %entry_point, "ℹ Missing parameter type annotation, consider `/// @param ctx {}`", CONTEXT_TYPE);
    }

    Ok((sig, doc.text))
}

/// Whether the script defines a public function with the given arity.
pub fn has_function(ast: &AST, name: &str, arity: usize) -> bool {
    ast.iter_functions()
        .any(|f| f.name == name && f.params.len() == arity && !matches!(f.access, FnAccess::Private))
}
