use serde::Deserialize;
use serde_json::Value;
use skilldock_core::{ExecutionContext, Outcome, Priority};
use skilldock_orchestrator::{CachingMiddleware, LoggingMiddleware, Orchestrator};
use skilldock_skills::{ResponseCache, SkillExt, SkillRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::{load_workspace, parse_params};

pub struct RunRequest {
    pub name: String,
    pub params: Option<String>,
    pub priority: Option<String>,
    pub task: Option<String>,
    pub retry: bool,
}

/// Dispatch one skill and print the outcome as JSON.
pub async fn run(skills_dir: Option<PathBuf>, request: RunRequest) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;

    let priority = match request.priority.as_deref() {
        Some(p) => p.parse::<Priority>()?,
        None => Priority::default(),
    };
    let ctx = ExecutionContext::try_new(request.task.unwrap_or_else(|| request.name.clone()))?
        .with_parameters(parse_params(request.params.as_deref())?)
        .with_priority(priority);

    let registry = match ws.registry.lookup(&request.name) {
        Some(record) if request.retry => {
            let retry = &ws.config.retry;
            info!(
                skill = %request.name,
                max_attempts = retry.max_attempts,
                base_delay_ms = retry.base_delay_ms,
                "Retry enabled"
            );
            let mut wrapped = SkillRegistry::new(&ws.config.skills, &ws.config.engine);
            wrapped.register(Arc::new(
                record
                    .skill()
                    .clone()
                    .retry(retry.max_attempts, retry.base_delay()),
            ))?;
            wrapped
        }
        _ => ws.registry,
    };

    let mut orchestrator = Orchestrator::new(Arc::new(registry), ws.config.orchestrator);
    orchestrator.add_middleware(LoggingMiddleware);

    // Dispatch blocks (retry backoff sleeps), so keep it off the runtime threads.
    let name = request.name;
    let outcome = tokio::task::spawn_blocking(move || orchestrator.execute(&name, &ctx)).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    skill: String,
    context: Value,
}

fn read_batch(path: &Path) -> anyhow::Result<Vec<(String, ExecutionContext)>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read batch file {}: {}", path.display(), e))?;
    let items: Vec<BatchItem> = serde_json::from_str(&content)?;

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let ctx = ExecutionContext::from_json(item.context)
                .map_err(|e| anyhow::anyhow!("Batch item {} ({}): {}", i, item.skill, e))?;
            Ok((item.skill, ctx))
        })
        .collect()
}

/// Dispatch a batch file in order, stopping at a failed critical item.
pub async fn batch(skills_dir: Option<PathBuf>, file: &Path) -> anyhow::Result<()> {
    let ws = load_workspace(skills_dir)?;
    let items = read_batch(file)?;
    let total = items.len();

    let mut orchestrator = Orchestrator::new(Arc::new(ws.registry), ws.config.orchestrator);
    orchestrator.add_middleware(LoggingMiddleware);
    orchestrator.add_middleware(CachingMiddleware::new(ResponseCache::new(), ws.config.cache.ttl()));

    let outcomes: Vec<Outcome> =
        tokio::task::spawn_blocking(move || orchestrator.execute_batch(items)).await?;

    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    eprintln!();
    eprintln!(
        "📊 {} of {} item(s) run, {} succeeded",
        outcomes.len(),
        total,
        succeeded
    );
    if outcomes.len() < total {
        eprintln!("⚠ Batch stopped early after a critical failure");
    }
    Ok(())
}
