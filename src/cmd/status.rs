//! Session inspection and teardown — `oracle status` and `oracle reset`.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use oracle::session::Session;

use super::load_context;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    let (_config, session) = load_context(project_dir, false)?;

    let Some(project) = &session.project else {
        println!("No current project. Run 'oracle generate' first.");
        return Ok(());
    };

    println!("{} {}", style("Project:").bold(), project.name);
    if let Some(language) = &session.language {
        println!("{} {}", style("Language:").bold(), language);
    }
    if let Some(architecture) = &session.architecture {
        println!("{} {}", style("Architecture:").bold(), architecture);
    }
    if let Some(hash) = &session.prompt_hash {
        println!("{} {}", style("Prompt hash:").bold(), hash);
    }
    println!(
        "{} {} files, {} lines",
        style("Size:").bold(),
        project.files.len(),
        project.files.total_lines(),
    );

    match &session.last_build {
        Some(build) if build.success => println!("{} passing", style("Build:").bold()),
        Some(_) => println!("{} failing", style("Build:").bold()),
        None => println!("{} not run", style("Build:").bold()),
    }
    match &session.last_test {
        Some(test) if test.success => println!("{} passing", style("Tests:").bold()),
        Some(test) => println!(
            "{} failing ({} command(s))",
            style("Tests:").bold(),
            test.failed_tests.len()
        ),
        None => println!("{} not run", style("Tests:").bold()),
    }

    if !session.explanations.is_empty() {
        println!(
            "{} {} repair attempt(s) recorded",
            style("Repairs:").bold(),
            session.explanations.len()
        );
    }
    if let Some(updated) = &session.updated_at {
        println!("{} {}", style("Updated:").bold(), updated.to_rfc3339());
    }
    Ok(())
}

pub fn cmd_reset(project_dir: &Path, force: bool) -> Result<()> {
    let (config, session) = load_context(project_dir, false)?;

    if !session.has_project() {
        println!("Session is already empty.");
        return Ok(());
    }

    if !force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Discard the current project and all reports?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Keeping session.");
            return Ok(());
        }
    }

    Session::reset(&config.session_file)?;
    println!("Session cleared.");
    Ok(())
}
