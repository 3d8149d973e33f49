//! Auxiliary artifact generation: CI/CD configs, container files,
//! deployment manifests, and analysis reports.
//!
//! Every operation here is a single completion call producing free text.
//! None of them mutate the Project; results are written under
//! `.oracle/artifacts/` for the user to take or leave. Generated CI/CD
//! YAML gets a parse-only sanity check so obviously broken output is
//! flagged instead of discovered in a pipeline run.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::warn;

use crate::llm::CompletionClient;
use crate::project::Project;

static YAML_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)```ya?ml\s*(.*?)```").unwrap());

/// Objectives for a refactoring report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefactorGoal {
    Readability,
    Performance,
    Size,
    Security,
}

impl RefactorGoal {
    fn instruction(self) -> &'static str {
        match self {
            RefactorGoal::Readability => "Refactor for maximum readability and maintainability",
            RefactorGoal::Performance => "Optimize for performance and efficiency",
            RefactorGoal::Size => "Minimize code size and bundle size",
            RefactorGoal::Security => "Enhance security and add security best practices",
        }
    }
}

impl FromStr for RefactorGoal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "readability" => Ok(RefactorGoal::Readability),
            "performance" => Ok(RefactorGoal::Performance),
            "size" => Ok(RefactorGoal::Size),
            "security" => Ok(RefactorGoal::Security),
            other => bail!(
                "Unknown refactor goal '{other}'. Use readability, performance, size, or security."
            ),
        }
    }
}

/// A generated artifact ready to be written to disk.
#[derive(Debug)]
pub struct GeneratedArtifact {
    pub file_name: String,
    pub content: String,
    /// For YAML-bearing artifacts: whether the YAML block parsed.
    pub yaml_valid: Option<bool>,
}

/// Check the first fenced YAML block (or the whole text when unfenced)
/// with a parse-only pass.
pub fn yaml_is_valid(text: &str) -> bool {
    let candidate = YAML_FENCE_REGEX
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| text.to_string());
    serde_yaml::from_str::<serde_yaml::Value>(&candidate).is_ok()
}

/// Lowercase a label into a file-name-friendly slug.
fn slug(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Write an artifact into the artifacts directory, returning the path.
pub fn save_artifact(dir: &Path, artifact: &GeneratedArtifact) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(&artifact.file_name);
    std::fs::write(&path, &artifact.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// One-shot artifact and analysis generations over the current Project.
pub struct ArtifactService {
    client: Arc<dyn CompletionClient>,
}

impl ArtifactService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// CI/CD pipeline configuration for the given platform.
    pub async fn cicd(&self, project: &Project, platform: &str) -> Result<GeneratedArtifact> {
        let prompt = format!(
            r#"Generate {platform} CI/CD configuration for this project:

Project: {}
Dependencies: {:?}
Build Commands: {:?}
Test Commands: {:?}

Include:
1. Build pipeline
2. Test automation
3. Security scanning
4. Deployment steps
5. Environment management

Platform: {platform}"#,
            project.name, project.dependencies, project.build_commands, project.test_commands,
        );

        let content = self.client.complete(&prompt).await?;
        let yaml_valid = yaml_is_valid(&content);
        if !yaml_valid {
            warn!(platform, "generated CI/CD config is not parseable YAML");
        }

        Ok(GeneratedArtifact {
            file_name: format!("cicd-{}.yml", slug(platform)),
            content,
            yaml_valid: Some(yaml_valid),
        })
    }

    /// Production Dockerfile for the project.
    pub async fn dockerfile(&self, project: &Project, language: &str) -> Result<GeneratedArtifact> {
        let prompt = format!(
            r#"Generate a production-ready Dockerfile for this {language} project:

Project: {}
Dependencies: {:?}
Run Commands: {:?}

Include multi-stage builds, security best practices, and minimal image size."#,
            project.name, project.dependencies, project.run_commands,
        );

        let content = self.client.complete(&prompt).await?;
        Ok(GeneratedArtifact {
            file_name: "Dockerfile".to_string(),
            content,
            yaml_valid: None,
        })
    }

    /// Deployment manifest for the given target (Docker Compose,
    /// Kubernetes, ...).
    pub async fn deployment(&self, project: &Project, target: &str) -> Result<GeneratedArtifact> {
        let prompt = format!(
            r#"Generate deployment configuration for {target} for this project:

Project: {}
Dependencies: {:?}
Run Commands: {:?}

Include resource limits, health checks, and environment configuration.

Deployment Target: {target}"#,
            project.name, project.dependencies, project.run_commands,
        );

        let content = self.client.complete(&prompt).await?;
        let yaml_valid = yaml_is_valid(&content);
        if !yaml_valid {
            warn!(target, "generated deployment manifest is not parseable YAML");
        }

        Ok(GeneratedArtifact {
            file_name: format!("deploy-{}.yml", slug(target)),
            content,
            yaml_valid: Some(yaml_valid),
        })
    }

    /// Line-by-line explanation of one file in the project.
    pub async fn explain(&self, project: &Project, path: &str, language: &str) -> Result<String> {
        let Some(code) = project.files.get(path) else {
            bail!("File '{path}' is not in the current project");
        };

        let prompt = format!(
            r#"Explain this {language} code line by line with:
1. What each function/class does
2. Time/space complexity analysis
3. Alternative approaches
4. How a senior developer would improve it
5. Potential issues or edge cases

Code:
{code}"#,
        );

        Ok(self.client.complete(&prompt).await?)
    }

    /// OWASP-style security review of the whole project.
    pub async fn security_scan(&self, project: &Project, language: &str) -> Result<String> {
        let files_json = serde_json::to_string_pretty(&project.files)
            .unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            r#"Perform a comprehensive security analysis of this {language} project using OWASP guidelines:

{files_json}

Identify:
1. Security vulnerabilities
2. Input validation issues
3. Authentication/authorization flaws
4. Data exposure risks
5. Dependency vulnerabilities

Return findings with severity levels and suggested fixes."#,
        );

        Ok(self.client.complete(&prompt).await?)
    }

    /// Refactoring suggestions for a goal. Report only — the Project is
    /// never mutated here.
    pub async fn refactor_report(&self, project: &Project, goal: RefactorGoal) -> Result<String> {
        let files_json = serde_json::to_string_pretty(&project.files)
            .unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            "{} for this project:\n\n{}\n\nReturn the refactored files with explanations.",
            goal.instruction(),
            files_json,
        );

        Ok(self.client.complete(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::project::FileMap;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct StubClient {
        response: String,
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, _prompt: &str) -> Result<String, TransportError> {
            Ok(self.response.clone())
        }
    }

    fn sample_project() -> Project {
        let mut files = FileMap::new();
        files.insert("main.py", "print('x')").unwrap();
        Project {
            name: "demo".into(),
            description: String::new(),
            files,
            dependencies: vec!["flask".into()],
            build_commands: vec!["pip install flask".into()],
            run_commands: vec!["python main.py".into()],
            test_commands: vec!["pytest".into()],
            architecture_notes: String::new(),
        }
    }

    fn service(response: &str) -> ArtifactService {
        ArtifactService::new(Arc::new(StubClient {
            response: response.to_string(),
        }))
    }

    #[test]
    fn yaml_validation_accepts_fenced_yaml() {
        let text = "Here is your pipeline:\n```yaml\nname: ci\non: [push]\n```\nDone.";
        assert!(yaml_is_valid(text));
    }

    #[test]
    fn yaml_validation_rejects_broken_yaml() {
        let text = "```yaml\nname: ci\n  bad_indent: [unclosed\n```";
        assert!(!yaml_is_valid(text));
    }

    #[test]
    fn refactor_goal_parses_case_insensitively() {
        assert_eq!(
            "Readability".parse::<RefactorGoal>().unwrap(),
            RefactorGoal::Readability
        );
        assert!("speed".parse::<RefactorGoal>().is_err());
    }

    #[tokio::test]
    async fn cicd_artifact_is_named_by_platform() {
        let artifact = service("```yaml\nname: ci\n```")
            .cicd(&sample_project(), "GitHub Actions")
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "cicd-github-actions.yml");
        assert_eq!(artifact.yaml_valid, Some(true));
    }

    #[tokio::test]
    async fn invalid_cicd_yaml_is_flagged_not_rejected() {
        let artifact = service("```yaml\n: : bad : :\n```")
            .cicd(&sample_project(), "GitLab CI")
            .await
            .unwrap();
        assert_eq!(artifact.yaml_valid, Some(false));
        assert!(!artifact.content.is_empty());
    }

    #[tokio::test]
    async fn dockerfile_artifact_has_fixed_name() {
        let artifact = service("FROM python:3.12-slim")
            .dockerfile(&sample_project(), "Python")
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "Dockerfile");
        assert!(artifact.yaml_valid.is_none());
    }

    #[tokio::test]
    async fn explain_requires_a_project_file() {
        let result = service("explanation")
            .explain(&sample_project(), "missing.py", "Python")
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("missing.py"));

        let ok = service("explanation")
            .explain(&sample_project(), "main.py", "Python")
            .await
            .unwrap();
        assert_eq!(ok, "explanation");
    }

    #[test]
    fn save_artifact_writes_under_artifacts_dir() {
        let dir = tempdir().unwrap();
        let artifact = GeneratedArtifact {
            file_name: "deploy-kubernetes.yml".into(),
            content: "kind: Deployment".into(),
            yaml_valid: Some(true),
        };
        let path = save_artifact(&dir.path().join("artifacts"), &artifact).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "kind: Deployment");
    }
}
