//! Auxiliary artifact and analysis commands — `oracle artifact`,
//! `oracle explain`, `oracle scan`, and `oracle refactor`.

use std::path::Path;

use anyhow::Result;
use console::style;

use oracle::artifacts::{ArtifactService, GeneratedArtifact, RefactorGoal, save_artifact};
use oracle::session::Session;

use super::{completion_client, load_context, require_project};
use crate::ArtifactCommands;

fn session_language(session: &Session) -> String {
    session
        .language
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

fn report_saved(artifact: &GeneratedArtifact, path: &Path) {
    println!(
        "{} wrote {}",
        style("✓").green(),
        path.display()
    );
    if artifact.yaml_valid == Some(false) {
        println!(
            "{} the generated YAML did not parse; review it before use",
            style("warning:").yellow()
        );
    }
}

pub async fn cmd_artifact(
    project_dir: &Path,
    command: &ArtifactCommands,
    verbose: bool,
) -> Result<()> {
    let (config, session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;
    let service = ArtifactService::new(completion_client(&config)?);

    let artifact = match command {
        ArtifactCommands::Cicd { platform } => {
            println!("Generating {platform} CI/CD configuration...");
            service.cicd(project, platform).await?
        }
        ArtifactCommands::Dockerfile => {
            println!("Generating Dockerfile...");
            service
                .dockerfile(project, &session_language(&session))
                .await?
        }
        ArtifactCommands::Deploy { target } => {
            println!("Generating {target} deployment configuration...");
            service.deployment(project, target).await?
        }
    };

    let path = save_artifact(&config.artifacts_dir, &artifact)?;
    report_saved(&artifact, &path);
    Ok(())
}

pub async fn cmd_explain(project_dir: &Path, path: &str, verbose: bool) -> Result<()> {
    let (config, session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;
    let service = ArtifactService::new(completion_client(&config)?);

    let explanation = service
        .explain(project, path, &session_language(&session))
        .await?;
    println!("{explanation}");
    Ok(())
}

pub async fn cmd_scan(project_dir: &Path, verbose: bool) -> Result<()> {
    let (config, session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;
    let service = ArtifactService::new(completion_client(&config)?);

    println!("Scanning {} for security issues...", project.name);
    let report = service
        .security_scan(project, &session_language(&session))
        .await?;
    println!("{report}");
    Ok(())
}

pub async fn cmd_refactor(project_dir: &Path, goal: &str, verbose: bool) -> Result<()> {
    let goal: RefactorGoal = goal.parse()?;
    let (config, session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;
    let service = ArtifactService::new(completion_client(&config)?);

    let report = service.refactor_report(project, goal).await?;
    println!("{report}");
    Ok(())
}
