//! Project materialization: write an in-memory file map to a real directory.
//!
//! Materialization is best-effort. One bad file from the model must not
//! block building or inspecting the rest of a mostly-valid project, so
//! per-file failures are collected and reported in aggregate instead of
//! aborting the batch.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::errors::MaterializeError;
use crate::project::FileMap;

/// Aggregate outcome of a materialization pass.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Number of files written successfully.
    pub written: usize,
    /// Per-file failures, in map order. Empty means full success.
    pub failures: Vec<(String, MaterializeError)>,
}

impl MaterializeReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write every file in `files` under `root`, creating intermediate
/// directories as needed and truncating files that already exist.
///
/// Creating `root` itself is the only hard failure; everything after that
/// is collected into the report. Re-running with the same inputs reproduces
/// the same on-disk state.
pub fn materialize(files: &FileMap, root: &Path) -> Result<MaterializeReport> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create project root {}", root.display()))?;

    let mut report = MaterializeReport::default();

    for (path, content) in files.iter() {
        match write_file(root, path, content) {
            Ok(()) => report.written += 1,
            Err(err) => {
                warn!(path, %err, "failed to materialize file");
                report.failures.push((path.to_string(), err));
            }
        }
    }

    Ok(report)
}

fn write_file(root: &Path, rel_path: &str, content: &str) -> Result<(), MaterializeError> {
    let full_path = root.join(rel_path);

    if let Some(parent) = full_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| io_error(rel_path, source))?;
    }

    std::fs::write(&full_path, content).map_err(|source| io_error(rel_path, source))
}

fn io_error(path: &str, source: io::Error) -> MaterializeError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        MaterializeError::PermissionDenied {
            path: path.to_string(),
        }
    } else {
        MaterializeError::Io {
            path: path.to_string(),
            source,
        }
    }
}
