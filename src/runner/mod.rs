//! Sequential subprocess execution with a per-command timeout.
//!
//! Each command line is whitespace-split into an executable and argv — a
//! documented limitation: arguments containing spaces cannot be expressed.
//! Commands run in order in the given working directory; there is a hard
//! wall-clock budget per command but no aggregate budget for the sequence.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::CommandError;
use crate::project::{BuildReport, TestReport};

/// The captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the command ran to completion with exit code zero.
    pub error: Option<CommandError>,
}

impl CommandOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// The stderr text to surface for a failing command. Timed-out and
    /// unspawnable commands have no captured stderr, so the failure reason
    /// stands in for it.
    fn failure_text(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if let Some(err) = &self.error {
            format!("{}\n", err)
        } else {
            String::new()
        }
    }
}

/// Aggregate result of running a command sequence.
///
/// Overall success is strict: every command must run to completion with
/// exit code zero. (The tolerant any-command-succeeded rule this replaced
/// is documented in DESIGN.md.)
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| !o.is_failure())
    }

    /// The literal command lines that failed, in execution order.
    pub fn failed_commands(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| o.command.clone())
            .collect()
    }

    /// Shape the run into a TestReport: `Command: <cmd>` labels plus stdout
    /// in order, stderr from failing commands only.
    pub fn into_test_report(self) -> TestReport {
        let mut output = String::new();
        let mut errors = String::new();
        let mut failed_tests = Vec::new();

        for outcome in &self.outcomes {
            output.push_str(&format!("Command: {}\n", outcome.command));
            output.push_str(&outcome.stdout);
            if outcome.is_failure() {
                errors.push_str(&outcome.failure_text());
                failed_tests.push(outcome.command.clone());
            }
        }

        TestReport {
            success: failed_tests.is_empty(),
            output,
            errors,
            failed_tests,
        }
    }

    /// Shape the run into a BuildReport: `$ <cmd>` labels plus stdout, with
    /// an `Error:` line appended for each failure.
    pub fn into_build_report(self) -> BuildReport {
        let success = self.success();
        let mut output = String::new();

        for outcome in &self.outcomes {
            output.push_str(&format!("$ {}\n{}\n", outcome.command, outcome.stdout));
            if outcome.is_failure() {
                output.push_str(&format!("Error: {}\n", outcome.failure_text().trim_end()));
            }
        }

        BuildReport { success, output }
    }
}

/// Runs shell command sequences in a working directory.
pub struct CommandRunner {
    timeout_per_command: Duration,
}

impl CommandRunner {
    pub fn new(timeout_per_command: Duration) -> Self {
        Self {
            timeout_per_command,
        }
    }

    /// Run every command in order, collecting per-command outcomes. A
    /// failure never stops the sequence; it is recorded and the next
    /// command runs.
    pub async fn run(&self, commands: &[String], cwd: &Path) -> RunReport {
        let mut report = RunReport::default();
        for command in commands {
            debug!(command, cwd = %cwd.display(), "running command");
            let outcome = self.run_one(command, cwd).await;
            if let Some(err) = &outcome.error {
                warn!(command, %err, "command failed");
            }
            report.outcomes.push(outcome);
        }
        report
    }

    async fn run_one(&self, command: &str, cwd: &Path) -> CommandOutcome {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return CommandOutcome {
                command: command.to_string(),
                stdout: String::new(),
                stderr: String::new(),
                error: Some(CommandError::SpawnFailed {
                    reason: "empty command line".to_string(),
                }),
            };
        };

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the child with it.
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome {
                    command: command.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(CommandError::SpawnFailed {
                        reason: e.to_string(),
                    }),
                };
            }
        };

        match timeout(self.timeout_per_command, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let error = if output.status.success() {
                    None
                } else {
                    Some(CommandError::NonZeroExit {
                        code: output.status.code().unwrap_or(-1),
                    })
                };
                CommandOutcome {
                    command: command.to_string(),
                    stdout,
                    stderr,
                    error,
                }
            }
            Ok(Err(e)) => CommandOutcome {
                command: command.to_string(),
                stdout: String::new(),
                stderr: String::new(),
                error: Some(CommandError::SpawnFailed {
                    reason: e.to_string(),
                }),
            },
            Err(_) => CommandOutcome {
                command: command.to_string(),
                stdout: String::new(),
                stderr: String::new(),
                error: Some(CommandError::TimedOut {
                    secs: self.timeout_per_command.as_secs(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    fn commands(cmds: &[&str]) -> Vec<String> {
        cmds.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn records_only_failing_commands() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner.run(&commands(&["true", "false"]), dir.path()).await;
        assert_eq!(report.failed_commands(), vec!["false"]);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn all_passing_commands_is_success() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner.run(&commands(&["true", "true"]), dir.path()).await;
        assert!(report.success());
        assert!(report.failed_commands().is_empty());
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner.run(&commands(&["echo hello"]), dir.path()).await;
        assert!(report.outcomes[0].stdout.contains("hello"));
    }

    #[tokio::test]
    async fn timed_out_command_is_killed_not_awaited() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_millis(200));

        let start = Instant::now();
        let report = runner.run(&commands(&["sleep 5"]), dir.path()).await;
        assert!(start.elapsed() < Duration::from_secs(4), "runner hung on timeout");

        assert_eq!(report.failed_commands(), vec!["sleep 5"]);
        assert!(matches!(
            report.outcomes[0].error,
            Some(CommandError::TimedOut { .. })
        ));
    }

    #[tokio::test]
    async fn unspawnable_command_is_recorded_like_any_failure() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner
            .run(&commands(&["definitely-not-a-real-binary-xyz"]), dir.path())
            .await;
        assert_eq!(report.failed_commands().len(), 1);
        assert!(matches!(
            report.outcomes[0].error,
            Some(CommandError::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_sequence() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner
            .run(&commands(&["false", "echo after"]), dir.path())
            .await;
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[1].stdout.contains("after"));
    }

    #[tokio::test]
    async fn test_report_shape_and_invariant() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner
            .run(&commands(&["echo ok", "false"]), dir.path())
            .await
            .into_test_report();

        assert_eq!(report.success, report.failed_tests.is_empty());
        assert!(!report.success);
        assert!(report.output.contains("Command: echo ok"));
        assert!(report.output.contains("ok"));
        assert!(report.output.contains("Command: false"));
        assert_eq!(report.failed_tests, vec!["false"]);
        // `false` writes nothing to stderr; the failure reason stands in.
        assert!(report.errors.contains("exited with code 1"));
    }

    #[tokio::test]
    async fn build_report_shape() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner
            .run(&commands(&["echo building", "false"]), dir.path())
            .await
            .into_build_report();

        assert!(!report.success);
        assert!(report.output.contains("$ echo building"));
        assert!(report.output.contains("building"));
        assert!(report.output.contains("Error:"));
    }

    #[tokio::test]
    async fn empty_command_line_is_a_spawn_failure() {
        let dir = tempdir().unwrap();
        let runner = CommandRunner::new(Duration::from_secs(5));

        let report = runner.run(&commands(&["   "]), dir.path()).await;
        assert!(matches!(
            report.outcomes[0].error,
            Some(CommandError::SpawnFailed { .. })
        ));
    }
}
