//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                        |
//! |------------|------------------------------------------|
//! | `project`  | `Generate`, `Run`, `Export`             |
//! | `pipeline` | `Build`, `Test`, `Repair`               |
//! | `artifact` | `Artifact`, `Explain`, `Scan`, `Refactor` |
//! | `status`   | `Status`, `Reset`                       |

pub mod artifact;
pub mod pipeline;
pub mod project;
pub mod status;

pub use artifact::{cmd_artifact, cmd_explain, cmd_refactor, cmd_scan};
pub use pipeline::{cmd_build, cmd_repair, cmd_test};
pub use project::{cmd_export, cmd_generate, cmd_run};
pub use status::{cmd_reset, cmd_status};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};

use oracle::config::Config;
use oracle::llm::CompletionClient;
use oracle::project::Project;
use oracle::session::Session;

/// Resolve config and session for a command.
fn load_context(project_dir: &Path, verbose: bool) -> Result<(Config, Session)> {
    let config = Config::new(project_dir.to_path_buf(), verbose)?;
    config.ensure_directories()?;
    let session = Session::load(&config.session_file)?;
    Ok((config, session))
}

/// The current project, or a pointer to `oracle generate`.
fn require_project(session: &Session) -> Result<&Project> {
    match &session.project {
        Some(project) => Ok(project),
        None => bail!("No current project. Run 'oracle generate' first."),
    }
}

/// Build the completion client from config. Fails fast when no credential
/// is available, before any pipeline work starts.
fn completion_client(config: &Config) -> Result<Arc<dyn CompletionClient>> {
    Ok(Arc::new(config.completion_client()?))
}
