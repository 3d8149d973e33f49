//! Project generation and the full pipeline — `oracle generate`,
//! `oracle run`, and `oracle export`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;

use oracle::errors::GenerationError;
use oracle::materialize::materialize;
use oracle::orchestrator::{Pipeline, PipelineOptions, PipelineOutcome};
use oracle::project::Project;
use oracle::session::Session;
use oracle::ui::PipelineUi;

use super::{completion_client, load_context, require_project};

/// Resolve the project description: CLI argument first, interactive prompt
/// otherwise.
fn resolve_prompt(prompt: Option<&str>) -> Result<String> {
    match prompt {
        Some(p) if !p.trim().is_empty() => Ok(p.to_string()),
        _ => {
            let input: String = dialoguer::Input::new()
                .with_prompt("Describe your project")
                .allow_empty(false)
                .interact_text()
                .context("Failed to read project description")?;
            Ok(input)
        }
    }
}

fn print_overview(project: &Project, language: &str, architecture: &str) {
    println!();
    println!("{} {}", style("Project:").bold(), project.name);
    println!("{} {}", style("Language:").bold(), language);
    println!("{} {}", style("Architecture:").bold(), architecture);
    println!(
        "{} {} files, {} lines, {} dependencies",
        style("Size:").bold(),
        project.files.len(),
        project.files.total_lines(),
        project.dependencies.len(),
    );
    println!("{} {}", style("Description:").bold(), project.description);
    println!();
    for path in project.files.paths() {
        println!("  {path}");
    }
    println!();
}

/// Surface a generation failure: malformed responses show the offending
/// raw text so the user can recover the project by hand.
fn report_generation_error(err: GenerationError) -> anyhow::Error {
    if let GenerationError::UnparsableResponse { source, raw } = &err {
        eprintln!("{} {source}", style("Generation failed:").red().bold());
        eprintln!("{}", style("--- raw model response ---").dim());
        eprintln!("{raw}");
        eprintln!("{}", style("--------------------------").dim());
    }
    err.into()
}

pub async fn cmd_generate(
    project_dir: &Path,
    prompt: Option<&str>,
    language: &str,
    architecture: &str,
    verbose: bool,
) -> Result<()> {
    let (config, mut session) = load_context(project_dir, verbose)?;
    let prompt = resolve_prompt(prompt)?;
    let client = completion_client(&config)?;
    let pipeline = Pipeline::new(config.clone(), client);

    println!("Generating project...");
    pipeline
        .generate_into(&mut session, &prompt, language, architecture)
        .await
        .map_err(report_generation_error)?;

    let project = require_project(&session)?;
    print_overview(project, language, architecture);
    session.save(&config.session_file)?;
    println!("{} project saved to session", style("✓").green());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_run(
    project_dir: &Path,
    prompt: Option<&str>,
    language: &str,
    architecture: &str,
    max_iterations: u32,
    run_tests: bool,
    run_repair: bool,
    verbose: bool,
) -> Result<()> {
    let (config, mut session) = load_context(project_dir, verbose)?;
    let client = completion_client(&config)?;
    let ui = Arc::new(PipelineUi::new(verbose));
    let pipeline = Pipeline::new(config.clone(), client).with_ui(ui.clone());

    // An explicit prompt always regenerates; otherwise an existing project
    // is re-run through the pipeline as-is.
    if prompt.is_some() || !session.has_project() {
        let prompt = resolve_prompt(prompt)?;
        ui.log("Generating project...");
        pipeline
            .generate_into(&mut session, &prompt, language, architecture)
            .await
            .map_err(report_generation_error)?;
        session.save(&config.session_file)?;
    }

    let options = PipelineOptions {
        max_iterations,
        run_tests,
        run_repair,
    };
    let outcome = pipeline.run_pipeline(&mut session, options).await?;
    session.save(&config.session_file)?;

    report_outcome(&outcome, &session, &ui);
    Ok(())
}

/// State clearly whether the loop stopped because tests passed or because
/// the budget ran out.
fn report_outcome(outcome: &PipelineOutcome, session: &Session, ui: &PipelineUi) {
    match outcome {
        PipelineOutcome::Passed { repair_attempts } => {
            ui.finish_success(&format!(
                "Tests passed after {repair_attempts} repair attempt(s)"
            ));
        }
        PipelineOutcome::BudgetExhausted { repair_attempts } => {
            ui.finish_warn(&format!(
                "Iteration budget exhausted after {repair_attempts} repair attempt(s); tests still failing"
            ));
            print_last_failures(session);
        }
        PipelineOutcome::RepairFailed { reason, .. } => {
            ui.finish_warn(&format!("Repair failed: {reason}"));
            print_last_failures(session);
        }
        PipelineOutcome::TestsFailed => {
            ui.finish_warn("Tests failed (repair not requested)");
            print_last_failures(session);
        }
        PipelineOutcome::TestsNotRun => {
            let build_ok = session.last_build.as_ref().is_some_and(|b| b.success);
            if build_ok {
                ui.finish_success("Build completed (tests not run)");
            } else {
                ui.finish_warn("Build failed (tests not run)");
            }
        }
    }

    if !session.explanations.is_empty() {
        println!();
        println!("{}", style("Repair notes:").bold());
        for (i, explanation) in session.explanations.iter().enumerate() {
            println!("  {}. {explanation}", i + 1);
        }
    }
}

/// Show per-command stderr for the failing tests, per the error-handling
/// contract.
fn print_last_failures(session: &Session) {
    let Some(report) = &session.last_test else {
        return;
    };
    if report.failed_tests.is_empty() {
        return;
    }
    println!();
    println!("{}", style("Failed commands:").red().bold());
    for cmd in &report.failed_tests {
        println!("  {cmd}");
    }
    if !report.errors.is_empty() {
        println!("{}", style("Captured stderr:").red());
        println!("{}", report.errors);
    }
}

pub fn cmd_export(project_dir: &Path, dest: &Path, verbose: bool) -> Result<()> {
    let (_config, session) = load_context(project_dir, verbose)?;
    let project = require_project(&session)?;

    let report = materialize(&project.files, dest)?;
    println!(
        "Exported {} file(s) to {}",
        report.written,
        dest.display()
    );
    if !report.is_success() {
        for (path, err) in &report.failures {
            eprintln!("{} {path}: {err}", style("failed:").red());
        }
        bail!("{} file(s) could not be written", report.failures.len());
    }
    Ok(())
}
