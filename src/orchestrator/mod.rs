//! The bounded generate → materialize → build → test → repair loop.
//!
//! State machine: Idle → Generating → Materializing → Building → Testing →
//! (Passing | Repairing) → Idle. The loop owns every stop decision:
//! - build failures are recorded, never retried — tests run regardless,
//!   because build and test are independent probes, not a pipeline gate
//! - a failing test run triggers one repair attempt per iteration, up to
//!   the configured budget
//! - budget exhaustion is a normal terminal outcome, not an error; the
//!   last (possibly still broken) Project is kept and surfaced as-is
//!
//! Each iteration materializes into a fresh scratch directory so stale
//! build artifacts from a previous file set cannot leak into the next run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::GenerationError;
use crate::generate::{GenerationService, build_prompt, compute_prompt_hash};
use crate::llm::CompletionClient;
use crate::materialize::{MaterializeReport, materialize};
use crate::project::{BuildReport, Project, TestReport};
use crate::repair::RepairService;
use crate::runner::CommandRunner;
use crate::session::Session;
use crate::ui::PipelineUi;

/// One materialize + build + test pass over the current Project.
#[derive(Debug)]
pub struct CycleReport {
    pub scratch: PathBuf,
    pub materialized: MaterializeReport,
    pub build: BuildReport,
    pub test: TestReport,
}

/// Terminal outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Tests passed; the Project is final.
    Passed { repair_attempts: u32 },
    /// Tests were still failing when the iteration budget ran out.
    BudgetExhausted { repair_attempts: u32 },
    /// The Repair Service itself failed; the last Project state is kept.
    RepairFailed {
        reason: String,
        repair_attempts: u32,
    },
    /// Tests failed and repair was not requested.
    TestsFailed,
    /// The run was configured to stop after build.
    TestsNotRun,
}

impl PipelineOutcome {
    /// Whether the loop stopped because tests passed, stated explicitly for
    /// the user (as opposed to running out of budget).
    pub fn is_passing(&self) -> bool {
        matches!(self, PipelineOutcome::Passed { .. })
    }
}

/// Gates for the automatic stages after generation.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub max_iterations: u32,
    pub run_tests: bool,
    pub run_repair: bool,
}

/// Drives the full loop against a single session.
///
/// Not reentrant within one session: the Project is mutated in place during
/// repair, so a second concurrent run over the same session is not allowed.
pub struct Pipeline {
    config: Config,
    generation: GenerationService,
    repair: RepairService,
    ui: Option<Arc<PipelineUi>>,
}

impl Pipeline {
    pub fn new(config: Config, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config,
            generation: GenerationService::new(client.clone()),
            repair: RepairService::new(client),
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<PipelineUi>) -> Self {
        self.ui = Some(ui);
        self
    }

    fn stage(&self, name: &str) {
        info!(stage = name, "pipeline stage");
        if let Some(ui) = &self.ui {
            ui.stage(name);
        }
    }

    /// Generate a new Project into the session, replacing any previous one.
    /// On failure the session is left untouched and the error is surfaced.
    pub async fn generate_into(
        &self,
        session: &mut Session,
        prompt: &str,
        language: &str,
        architecture: &str,
    ) -> Result<(), GenerationError> {
        self.stage("Generating");
        let project = self.generation.generate(prompt, language, architecture).await?;
        let hash = compute_prompt_hash(&build_prompt(prompt, language, architecture));
        session.set_project(
            project,
            hash,
            language.to_string(),
            architecture.to_string(),
        );
        Ok(())
    }

    /// A fresh scratch directory for one materialize/build/test cycle.
    /// Never reused across iterations.
    fn fresh_scratch_dir(&self) -> PathBuf {
        self.config.scratch_dir.join(Uuid::new_v4().to_string())
    }

    /// Materialize the project and run its build and test command lists.
    /// Tests run even when the build failed.
    pub async fn run_cycle(&self, project: &Project) -> Result<CycleReport> {
        let scratch = self.fresh_scratch_dir();

        self.stage("Materializing");
        let materialized = materialize(&project.files, &scratch)?;
        if !materialized.is_success() {
            warn!(
                failures = materialized.failures.len(),
                "materialization was partial"
            );
        }

        self.stage("Building");
        let build = CommandRunner::new(self.config.build_timeout)
            .run(&project.build_commands, &scratch)
            .await
            .into_build_report();

        self.stage("Testing");
        let test = CommandRunner::new(self.config.test_timeout)
            .run(&project.test_commands, &scratch)
            .await
            .into_test_report();

        Ok(CycleReport {
            scratch,
            materialized,
            build,
            test,
        })
    }

    /// Run the materialize/build/test/repair loop over the session's
    /// current Project until tests pass, the budget is exhausted, or repair
    /// fails. The session's reports are updated after every cycle.
    pub async fn run_pipeline(
        &self,
        session: &mut Session,
        options: PipelineOptions,
    ) -> Result<PipelineOutcome> {
        if session.project.is_none() {
            bail!("No project in session. Run 'oracle generate' first.");
        }

        let mut repair_attempts: u32 = 0;

        loop {
            let project = session
                .project
                .as_ref()
                .context("project disappeared mid-pipeline")?;
            let cycle = self.run_cycle(project).await?;
            if !cycle.build.success {
                warn!("build failed; continuing to tests");
            }
            session.last_build = Some(cycle.build);

            if !options.run_tests {
                session.last_test = None;
                return Ok(PipelineOutcome::TestsNotRun);
            }

            let test = cycle.test;
            session.last_test = Some(test.clone());

            if test.success {
                info!(repair_attempts, "tests passed");
                return Ok(PipelineOutcome::Passed { repair_attempts });
            }

            if !options.run_repair {
                return Ok(PipelineOutcome::TestsFailed);
            }

            if repair_attempts >= options.max_iterations {
                info!(repair_attempts, "iteration budget exhausted");
                return Ok(PipelineOutcome::BudgetExhausted { repair_attempts });
            }

            repair_attempts += 1;
            self.stage("Repairing");
            if let Some(ui) = &self.ui {
                ui.iteration(repair_attempts, options.max_iterations);
            }

            let project = session
                .project
                .as_mut()
                .context("project disappeared mid-pipeline")?;
            match self.repair.repair(project, &test).await {
                Ok(explanation) => {
                    session.explanations.push(explanation);
                }
                Err(e) => {
                    warn!(%e, "repair failed; keeping last project state");
                    return Ok(PipelineOutcome::RepairFailed {
                        reason: e.to_string(),
                        repair_attempts,
                    });
                }
            }
        }
    }
}
