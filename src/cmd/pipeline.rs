//! Standalone pipeline stages — `oracle build`, `oracle test`, and
//! `oracle repair`.
//!
//! Each stage materializes the current project into its own fresh scratch
//! directory, so results never depend on leftovers from a previous run.

use std::path::Path;

use anyhow::{Result, bail};
use console::style;
use uuid::Uuid;

use oracle::materialize::materialize;
use oracle::repair::RepairService;
use oracle::runner::CommandRunner;

use super::{completion_client, load_context, require_project};

pub async fn cmd_build(project_dir: &Path, verbose: bool) -> Result<()> {
    let (config, mut session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;

    let scratch = config.scratch_dir.join(Uuid::new_v4().to_string());
    let materialized = materialize(&project.files, &scratch)?;
    if !materialized.is_success() {
        eprintln!(
            "{} {} file(s) could not be materialized",
            style("warning:").yellow(),
            materialized.failures.len()
        );
    }

    println!("Building in {}", scratch.display());
    let report = CommandRunner::new(config.build_timeout)
        .run(&project.build_commands, &scratch)
        .await
        .into_build_report();

    println!("{}", report.output);
    if report.success {
        println!("{} build succeeded", style("✓").green());
    } else {
        println!("{} build failed", style("✗").red());
    }

    session.last_build = Some(report);
    session.save(&config.session_file)?;
    Ok(())
}

pub async fn cmd_test(project_dir: &Path, verbose: bool) -> Result<()> {
    let (config, mut session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;

    let scratch = config.scratch_dir.join(Uuid::new_v4().to_string());
    let materialized = materialize(&project.files, &scratch)?;
    if !materialized.is_success() {
        eprintln!(
            "{} {} file(s) could not be materialized",
            style("warning:").yellow(),
            materialized.failures.len()
        );
    }

    println!("Testing in {}", scratch.display());
    let report = CommandRunner::new(config.test_timeout)
        .run(&project.test_commands, &scratch)
        .await
        .into_test_report();

    println!("{}", report.output);
    if report.success {
        println!("{} all tests passed", style("✓").green());
    } else {
        println!("{} failing commands:", style("✗").red());
        for cmd in &report.failed_tests {
            println!("  {cmd}");
        }
        if !report.errors.is_empty() {
            println!("{}", style("Captured stderr:").red());
            println!("{}", report.errors);
        }
    }

    session.last_test = Some(report);
    session.save(&config.session_file)?;
    Ok(())
}

pub async fn cmd_repair(project_dir: &Path, verbose: bool) -> Result<()> {
    let (config, mut session) = load_context(project_dir, verbose)?;
    require_project(&session)?;

    let report = match &session.last_test {
        Some(report) if !report.success => report.clone(),
        Some(_) => bail!("Last test run passed; nothing to repair."),
        None => bail!("No test report in session. Run 'oracle test' first."),
    };

    let client = completion_client(&config)?;
    let service = RepairService::new(client);
    let Some(project) = session.project.as_mut() else {
        bail!("No current project. Run 'oracle generate' first.");
    };

    println!("Requesting repair for {} failing command(s)...", report.failed_tests.len());
    let explanation = service.repair(project, &report).await?;

    println!("{} patch applied", style("✓").green());
    if !explanation.is_empty() {
        println!("{explanation}");
    }
    session.explanations.push(explanation);
    session.save(&config.session_file)?;
    println!("Re-run 'oracle test' to verify the fix.");
    Ok(())
}
