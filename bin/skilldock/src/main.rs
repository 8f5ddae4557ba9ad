mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "skilldock")]
#[command(about = "Discover and dispatch Rhai skills", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skills directory (overrides config skills.dir)
    #[arg(long, global = true)]
    skills_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered skills
    List,

    /// Show details for one skill
    Info {
        /// Skill name (file stem)
        name: String,
    },

    /// Dispatch a skill and print its outcome
    Run {
        /// Skill name (file stem)
        name: String,

        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,

        /// low, normal, high or critical
        #[arg(long)]
        priority: Option<String>,

        /// Task identifier (defaults to the skill name)
        #[arg(short, long)]
        task: Option<String>,

        /// Retry failures with the configured backoff
        #[arg(long)]
        retry: bool,
    },

    /// Run a skill's validate() entry without executing it
    Check {
        /// Skill name (file stem)
        name: String,

        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// Dispatch a JSON file of {"skill", "context"} items in order
    Batch {
        /// Path to the batch file
        file: PathBuf,
    },

    /// Show discovery load errors
    Errors,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so outcome JSON on stdout stays parseable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let skills_dir = cli.skills_dir;

    match cli.command {
        Commands::List => {
            commands::skills::list(skills_dir).await?;
        }
        Commands::Info { name } => {
            commands::skills::info(skills_dir, &name).await?;
        }
        Commands::Run {
            name,
            params,
            priority,
            task,
            retry,
        } => {
            let request = commands::run_cmd::RunRequest {
                name,
                params,
                priority,
                task,
                retry,
            };
            commands::run_cmd::run(skills_dir, request).await?;
        }
        Commands::Check { name, params } => {
            commands::skills::check(skills_dir, &name, params.as_deref()).await?;
        }
        Commands::Batch { file } => {
            commands::run_cmd::batch(skills_dir, &file).await?;
        }
        Commands::Errors => {
            commands::skills::errors(skills_dir).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show(skills_dir).await?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
        },
    }

    Ok(())
}
