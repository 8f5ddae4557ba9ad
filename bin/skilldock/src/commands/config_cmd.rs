use skilldock_core::{Config, Paths};
use std::path::PathBuf;

/// Show the current configuration as pretty-printed JSON.
pub async fn show(skills_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let json = serde_json::to_value(&config)?;
    let effective_dir = skills_dir.unwrap_or_else(|| config.skills_dir(&paths));

    println!();
    println!("📋 Current Configuration");
    println!("  File:   {}", paths.config_file().display());
    println!("  Skills: {}", effective_dir.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Write the default configuration and create the skills directory.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(&config_path)?;
    let skills_dir = config.skills_dir(&paths);
    std::fs::create_dir_all(&skills_dir)?;

    println!("✅ Wrote {}", config_path.display());
    println!("   Skills directory: {}", skills_dir.display());
    Ok(())
}
