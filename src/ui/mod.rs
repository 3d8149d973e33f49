//! Terminal UI for the pipeline, rendered via `indicatif`.
//!
//! Two bars are stacked vertically: a stage spinner showing which pipeline
//! stage is active, and an iteration line tracking the repair budget.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct PipelineUi {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    iteration_bar: ProgressBar,
    verbose: bool,
}

impl PipelineUi {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let stage_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");
        let stage_bar = multi.add(ProgressBar::new_spinner());
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stage");
        stage_bar.enable_steady_tick(Duration::from_millis(120));

        let iteration_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {msg}")
            .expect("progress bar template is a valid static string");
        let iteration_bar = multi.add(ProgressBar::new(0));
        iteration_bar.set_style(iteration_style);
        iteration_bar.set_prefix(" Iter");

        Self {
            multi,
            stage_bar,
            iteration_bar,
            verbose,
        }
    }

    /// Announce the active pipeline stage.
    pub fn stage(&self, name: &str) {
        self.stage_bar.set_message(name.to_string());
    }

    /// Show the current repair attempt against the budget.
    pub fn iteration(&self, current: u32, max: u32) {
        self.iteration_bar
            .set_message(format!("repair attempt {current}/{max}"));
    }

    /// Print a line without disturbing the bars.
    pub fn log(&self, message: &str) {
        if self.multi.println(message).is_err() {
            eprintln!("{message}");
        }
    }

    /// Verbose-only detail line.
    pub fn log_step(&self, message: &str) {
        if self.verbose {
            self.log(&format!("  {}", style(message).dim()));
        }
    }

    pub fn finish_success(&self, message: &str) {
        self.stage_bar
            .finish_with_message(format!("{} {}", style("✓").green(), message));
        self.iteration_bar.finish_and_clear();
    }

    pub fn finish_warn(&self, message: &str) {
        self.stage_bar
            .finish_with_message(format!("{} {}", style("!").yellow(), message));
        self.iteration_bar.finish_and_clear();
    }
}
