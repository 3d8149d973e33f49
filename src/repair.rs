//! Repair: turn a failing TestReport into a sparse patch.
//!
//! Single-shot per call — the bounded retry loop lives in the orchestrator,
//! not here. The prompt always carries the full current file contents, not a
//! diff: the model cannot reliably infer cross-file context from fragments,
//! and that context-size cost is accepted by design.

use std::sync::Arc;

use tracing::info;

use crate::errors::{ExtractionError, RepairError};
use crate::extract::{extract_json, require_keys};
use crate::llm::CompletionClient;
use crate::project::{FileMap, FileMapError, Project, RepairPatch, TestReport};

/// Build the repair prompt from the project and its failing report.
pub fn build_repair_prompt(project: &Project, report: &TestReport) -> String {
    let file_contents = serde_json::to_string_pretty(&project.files)
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"The following project has failing tests. Analyze the errors and fix the code.

Project Structure: {:?}
Test Errors: {}
Failed Commands: {:?}

Current Code Files:
{}

Fix the issues. Focus on:
1. Syntax errors
2. Import/dependency issues
3. Logic errors causing test failures
4. Missing error handling

Return only the corrected files that need changes, as a JSON object inside a ```json fenced block:
{{
    "fixed_files": {{
        "filename": "corrected content"
    }},
    "fix_explanation": "What was fixed and why"
}}"#,
        project.files.paths(),
        report.errors,
        report.failed_tests,
        file_contents
    )
}

/// Parse a raw repair response into a sparse patch.
pub fn parse_repair_response(raw: &str) -> Result<RepairPatch, RepairError> {
    let unparsable = |source: ExtractionError| RepairError::UnparsableResponse {
        source,
        raw: raw.to_string(),
    };

    let value = extract_json(raw).map_err(unparsable)?;
    require_keys(&value, &["fixed_files"]).map_err(unparsable)?;

    let fixed_files = FileMap::from_json_value(&value["fixed_files"]).map_err(|e| match e {
        FileMapError::InvalidPath(p) => RepairError::InvalidPath(p.to_string()),
        shape => RepairError::UnparsableResponse {
            source: ExtractionError::SchemaMismatch {
                key: format!("fixed_files ({shape})"),
            },
            raw: raw.to_string(),
        },
    })?;

    let explanation = value["fix_explanation"]
        .as_str()
        .or_else(|| value["explanation"].as_str())
        .unwrap_or_default()
        .to_string();

    Ok(RepairPatch {
        fixed_files,
        explanation,
    })
}

/// Overlay a patch onto the project: overwrite existing files, insert new
/// ones, never delete. This is the one place a Project is mutated outside
/// generation.
pub fn apply_patch(project: &mut Project, patch: &RepairPatch) {
    project.files.merge(&patch.fixed_files);
}

/// Turns a (Project, failing TestReport) pair into a patched Project.
pub struct RepairService {
    client: Arc<dyn CompletionClient>,
}

impl RepairService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// One completion call; applies the returned overlay in place and
    /// returns the model's explanation. The caller decides whether to retry.
    pub async fn repair(
        &self,
        project: &mut Project,
        report: &TestReport,
    ) -> Result<String, RepairError> {
        let prompt = build_repair_prompt(project, report);
        let raw = self.client.complete(&prompt).await?;
        let patch = parse_repair_response(&raw)?;

        info!(
            patched = patch.fixed_files.len(),
            "applying repair patch"
        );
        apply_patch(project, &patch);
        Ok(patch.explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::project::FileMap;
    use async_trait::async_trait;

    fn project_with(pairs: &[(&str, &str)]) -> Project {
        let mut files = FileMap::new();
        for (p, c) in pairs {
            files.insert(*p, *c).unwrap();
        }
        Project {
            name: "demo".into(),
            description: String::new(),
            files,
            dependencies: vec![],
            build_commands: vec![],
            run_commands: vec![],
            test_commands: vec!["pytest".into()],
            architecture_notes: String::new(),
        }
    }

    fn failing_report() -> TestReport {
        TestReport {
            success: false,
            output: "Command: pytest\n".into(),
            errors: "NameError: name 'foo' is not defined".into(),
            failed_tests: vec!["pytest".into()],
        }
    }

    struct StubClient {
        response: String,
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, _prompt: &str) -> Result<String, TransportError> {
            Ok(self.response.clone())
        }
    }

    #[test]
    fn overlay_overwrites_and_keeps_untouched_files() {
        let mut project = project_with(&[("x.py", "old"), ("y.py", "keep")]);
        let mut fixed = FileMap::new();
        fixed.insert("x.py", "new").unwrap();
        let patch = RepairPatch {
            fixed_files: fixed,
            explanation: String::new(),
        };

        apply_patch(&mut project, &patch);
        assert_eq!(project.files.get("x.py"), Some("new"));
        assert_eq!(project.files.get("y.py"), Some("keep"));
        assert_eq!(project.files.len(), 2);
    }

    #[test]
    fn parses_fenced_repair_response() {
        let raw = r#"I found the bug.

```json
{"fixed_files": {"x.py": "fixed"}, "fix_explanation": "defined foo"}
```"#;
        let patch = parse_repair_response(raw).unwrap();
        assert_eq!(patch.fixed_files.get("x.py"), Some("fixed"));
        assert_eq!(patch.explanation, "defined foo");
    }

    #[test]
    fn missing_fixed_files_key_is_unparsable_with_raw() {
        let raw = r#"```json
{"fix_explanation": "nothing to do"}
```"#;
        let err = parse_repair_response(raw).unwrap_err();
        match err {
            RepairError::UnparsableResponse { source, raw: kept } => {
                assert!(matches!(
                    source,
                    ExtractionError::SchemaMismatch { ref key } if key == "fixed_files"
                ));
                assert!(kept.contains("nothing to do"));
            }
            other => panic!("Expected UnparsableResponse, got {other:?}"),
        }
    }

    #[test]
    fn escaping_patch_path_is_rejected() {
        let raw = r#"```json
{"fixed_files": {"../../etc/passwd": "boom"}}
```"#;
        let err = parse_repair_response(raw).unwrap_err();
        assert!(matches!(err, RepairError::InvalidPath(_)));
    }

    #[test]
    fn prompt_carries_failures_and_full_file_contents() {
        let project = project_with(&[("x.py", "def f(): pass"), ("y.py", "import x")]);
        let prompt = build_repair_prompt(&project, &failing_report());

        assert!(prompt.contains("NameError"));
        assert!(prompt.contains("pytest"));
        assert!(prompt.contains("def f(): pass"));
        assert!(prompt.contains("import x"));
        assert!(prompt.contains("fixed_files"));
    }

    #[tokio::test]
    async fn service_applies_patch_in_place() {
        let mut project = project_with(&[("x.py", "old"), ("y.py", "keep")]);
        let service = RepairService::new(Arc::new(StubClient {
            response: r#"```json
{"fixed_files": {"x.py": "new", "z.py": "added"}, "fix_explanation": "rewrote x"}
```"#
                .to_string(),
        }));

        let explanation = service
            .repair(&mut project, &failing_report())
            .await
            .unwrap();

        assert_eq!(explanation, "rewrote x");
        assert_eq!(project.files.get("x.py"), Some("new"));
        assert_eq!(project.files.get("y.py"), Some("keep"));
        assert_eq!(project.files.get("z.py"), Some("added"));
    }

    #[tokio::test]
    async fn unparsable_response_leaves_project_untouched() {
        let mut project = project_with(&[("x.py", "old")]);
        let service = RepairService::new(Arc::new(StubClient {
            response: "I give up.".to_string(),
        }));

        let err = service
            .repair(&mut project, &failing_report())
            .await
            .unwrap_err();
        assert!(matches!(err, RepairError::UnparsableResponse { .. }));
        assert_eq!(project.files.get("x.py"), Some("old"));
    }
}
