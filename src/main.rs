use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "oracle")]
#[command(version, about = "AI-powered project generator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a project from a natural-language description
    Generate {
        /// Project description; prompted for interactively when omitted
        prompt: Option<String>,

        /// Target programming language
        #[arg(short, long, default_value = "Python")]
        language: String,

        /// Architecture pattern label (standard, MVC, microservices, ...)
        #[arg(long, default_value = "standard")]
        arch: String,
    },
    /// Generate, then build, test, and auto-repair until passing or out of budget
    Run {
        /// Project description; prompted for interactively when omitted
        prompt: Option<String>,

        #[arg(short, long, default_value = "Python")]
        language: String,

        #[arg(long, default_value = "standard")]
        arch: String,

        /// Maximum auto-repair attempts before giving up
        #[arg(long, default_value = "3")]
        max_iterations: u32,

        /// Stop after the build stage
        #[arg(long)]
        no_test: bool,

        /// Report test failures without attempting repairs
        #[arg(long)]
        no_repair: bool,
    },
    /// Build the current project in a fresh scratch directory
    Build,
    /// Run the current project's tests in a fresh scratch directory
    Test,
    /// One repair pass from the last failing test report
    Repair,
    /// Materialize the current project into a directory
    Export {
        /// Destination directory
        dest: PathBuf,
    },
    /// Generate auxiliary artifacts for the current project
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
    /// Explain one file of the current project
    Explain {
        /// Path of the file inside the project
        path: String,
    },
    /// Security review of the current project
    Scan,
    /// Refactoring report for an objective
    Refactor {
        /// readability, performance, size, or security
        #[arg(long, default_value = "readability")]
        goal: String,
    },
    /// Show session status
    Status,
    /// Clear session state
    Reset {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ArtifactCommands {
    /// CI/CD pipeline configuration
    Cicd {
        #[arg(long, default_value = "GitHub Actions")]
        platform: String,
    },
    /// Production Dockerfile
    Dockerfile,
    /// Deployment manifest
    Deploy {
        #[arg(long, default_value = "Docker Compose")]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "oracle=debug" } else { "oracle=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Generate {
            prompt,
            language,
            arch,
        } => {
            cmd::cmd_generate(&project_dir, prompt.as_deref(), language, arch, cli.verbose).await?;
        }
        Commands::Run {
            prompt,
            language,
            arch,
            max_iterations,
            no_test,
            no_repair,
        } => {
            cmd::cmd_run(
                &project_dir,
                prompt.as_deref(),
                language,
                arch,
                *max_iterations,
                !*no_test,
                !*no_repair,
                cli.verbose,
            )
            .await?;
        }
        Commands::Build => cmd::cmd_build(&project_dir, cli.verbose).await?,
        Commands::Test => cmd::cmd_test(&project_dir, cli.verbose).await?,
        Commands::Repair => cmd::cmd_repair(&project_dir, cli.verbose).await?,
        Commands::Export { dest } => cmd::cmd_export(&project_dir, dest, cli.verbose)?,
        Commands::Artifact { command } => {
            cmd::cmd_artifact(&project_dir, command, cli.verbose).await?;
        }
        Commands::Explain { path } => cmd::cmd_explain(&project_dir, path, cli.verbose).await?,
        Commands::Scan => cmd::cmd_scan(&project_dir, cli.verbose).await?,
        Commands::Refactor { goal } => cmd::cmd_refactor(&project_dir, goal, cli.verbose).await?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, *force)?,
    }

    Ok(())
}
