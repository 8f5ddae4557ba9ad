use skilldock_core::ExecutionContext;
use skilldock_orchestrator::Orchestrator;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_workspace, parse_params};

/// List discovered skills.
pub async fn list(skills_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;
    let names = ws.registry.list_names();

    println!();
    println!("📦 Skills ({})", names.len());
    println!("  Directory: {}", ws.skills_dir.display());
    println!();

    for name in &names {
        let Some(record) = ws.registry.get(name) else {
            continue;
        };
        let marker = if record.signature().is_complete() { "✓" } else { "⚠" };
        match record.documentation() {
            Some(doc) => {
                let first_line = doc.lines().next().unwrap_or_default();
                println!("  {} {:<24} {}", marker, name, first_line);
            }
            None => println!("  {} {}", marker, name),
        }
    }

    let errors = ws.registry.load_errors();
    if !errors.is_empty() {
        println!();
        println!("  {} file(s) failed to load. Run `skilldock errors` for details.", errors.len());
    }
    Ok(())
}

/// Show one skill's record and description.
pub async fn info(skills_dir: Option<PathBuf>, name: &str) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;
    let record = ws.registry.get(name).ok_or_else(|| {
        anyhow::anyhow!("Skill '{}' not found. Use `skilldock list` to see available skills.", name)
    })?;

    println!();
    println!("🔧 {}", record.name());
    if let Some(path) = record.source_location() {
        println!("  Source:    {}", path.display());
    }
    println!("  Signature: {}", record.signature().render());
    if !record.signature().is_complete() {
        println!("             (add `/// @param ctx ExecutionContext` and `/// @returns Outcome`)");
    }
    println!(
        "  Validate:  {}",
        if record.skill().as_validatable().is_some() { "yes" } else { "no" }
    );
    if let Some(doc) = record.documentation() {
        println!();
        for line in doc.lines() {
            println!("  {}", line);
        }
    }

    if let Some(description) = ws.registry.describe(name) {
        let description = description?;
        println!();
        println!("  Summary:   {}", description.summary);
        if let Some(version) = &description.version {
            println!("  Version:   {}", version);
        }
        if let Some(author) = &description.author {
            println!("  Author:    {}", author);
        }
        if !description.tags.is_empty() {
            println!("  Tags:      {}", description.tags.join(", "));
        }
        if !description.parameters.is_null() {
            println!("  Parameters:");
            println!("{}", serde_json::to_string_pretty(&description.parameters)?);
        }
    }
    Ok(())
}

/// Run the validate() entry point of a skill.
pub async fn check(skills_dir: Option<PathBuf>, name: &str, params: Option<&str>) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;
    let ctx = ExecutionContext::try_new(name)?.with_parameters(parse_params(params)?);
    let orchestrator = Orchestrator::new(Arc::new(ws.registry), ws.config.orchestrator);

    let outcome = orchestrator.validate(name, &ctx);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Print per-file discovery failures.
pub async fn errors(skills_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;
    let errors = ws.registry.load_errors();

    if errors.is_empty() {
        println!("✅ All skill files loaded.");
        return Ok(());
    }

    println!();
    println!("❌ Load errors ({})", errors.len());
    for (name, message) in errors {
        println!("  {}: {}", name, message);
    }
    Ok(())
}
