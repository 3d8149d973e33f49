//! Session state: the single current Project plus its accumulated reports.
//!
//! All mutable pipeline state lives here, owned by the orchestration layer
//! and passed explicitly — no ambient globals. The session is replaced
//! wholesale on each action (a new generation discards the old project and
//! its reports); only the repair path mutates the project in place.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::{BuildReport, Project, TestReport};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub project: Option<Project>,
    /// Truncated SHA-256 of the generation prompt that produced the project.
    pub prompt_hash: Option<String>,
    pub language: Option<String>,
    pub architecture: Option<String>,
    pub last_build: Option<BuildReport>,
    pub last_test: Option<TestReport>,
    /// Repair explanations, oldest first, across the project's lifetime.
    #[serde(default)]
    pub explanations: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Load the session from disk; a missing file is an empty session.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file {}", path.display()))
    }

    /// Persist the session, stamping `updated_at`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Some(Utc::now());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        Ok(())
    }

    /// Install a freshly generated project, discarding everything from the
    /// previous one.
    pub fn set_project(
        &mut self,
        project: Project,
        prompt_hash: String,
        language: String,
        architecture: String,
    ) {
        self.project = Some(project);
        self.prompt_hash = Some(prompt_hash);
        self.language = Some(language);
        self.architecture = Some(architecture);
        self.last_build = None;
        self.last_test = None;
        self.explanations.clear();
    }

    pub fn has_project(&self) -> bool {
        self.project.is_some()
    }

    /// Delete the persisted session file, if any.
    pub fn reset(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::FileMap;
    use tempfile::tempdir;

    fn sample_project() -> Project {
        let mut files = FileMap::new();
        files.insert("main.py", "print(1)").unwrap();
        Project {
            name: "demo".into(),
            description: "d".into(),
            files,
            dependencies: vec![],
            build_commands: vec![],
            run_commands: vec![],
            test_commands: vec!["pytest".into()],
            architecture_notes: String::new(),
        }
    }

    #[test]
    fn missing_file_loads_empty_session() {
        let dir = tempdir().unwrap();
        let session = Session::load(&dir.path().join("session.json")).unwrap();
        assert!(!session.has_project());
        assert!(session.explanations.is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".oracle/session.json");

        let mut session = Session::default();
        session.set_project(
            sample_project(),
            "abc123def456".into(),
            "Python".into(),
            "standard".into(),
        );
        session.explanations.push("fixed an import".into());
        session.save(&path).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.project.as_ref().unwrap().name, "demo");
        assert_eq!(loaded.prompt_hash.as_deref(), Some("abc123def456"));
        assert_eq!(loaded.explanations, vec!["fixed an import"]);
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn set_project_discards_previous_reports() {
        let mut session = Session::default();
        session.last_test = Some(TestReport {
            success: false,
            output: String::new(),
            errors: "boom".into(),
            failed_tests: vec!["pytest".into()],
        });
        session.explanations.push("old fix".into());

        session.set_project(sample_project(), "h".into(), "Go".into(), "mvc".into());
        assert!(session.last_test.is_none());
        assert!(session.last_build.is_none());
        assert!(session.explanations.is_empty());
        assert_eq!(session.language.as_deref(), Some("Go"));
    }

    #[test]
    fn reset_removes_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        Session::default().save(&path).unwrap();
        assert!(path.exists());

        Session::reset(&path).unwrap();
        assert!(!path.exists());
        // Resetting again is a no-op.
        Session::reset(&path).unwrap();
    }

    #[test]
    fn corrupt_session_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json {{{").unwrap();
        assert!(Session::load(&path).is_err());
    }
}
