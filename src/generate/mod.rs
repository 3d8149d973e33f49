//! Project generation: one completion call, one structured extraction.
//!
//! The service builds a single request embedding the user prompt, target
//! language, and architecture pattern, plus an explicit schema description.
//! The README / dependency-manifest / test-file requirements are *requested*
//! invariants on the model — this system cannot enforce them, only validate
//! the shape that comes back. There is no internal retry: a malformed
//! response fails the call and the raw text is preserved for the user.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::errors::{ExtractionError, GenerationError};
use crate::extract::{extract_json, require_keys};
use crate::llm::CompletionClient;
use crate::project::{FileMap, FileMapError, Project};

/// The schema-bearing prompt template for full-project generation.
pub const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert software engineer. Generate a complete, production-ready project based on the user's requirements.

CRITICAL REQUIREMENTS:
1. Create a multi-file project structure with proper organization
2. Include all necessary files: source code, tests, README.md, a dependency manifest, and .gitignore
3. Write actual working code, not pseudocode or placeholders
4. Include error handling and logging
5. Follow the target language's best practices and conventions
6. Include at least one test file

Return the response as a JSON object inside a ```json fenced block with this exact structure:
{
    "project_name": "project-name",
    "description": "Brief project description",
    "files": {
        "filename1.ext": "file content here",
        "tests/test_file.ext": "test content here",
        "README.md": "comprehensive readme"
    },
    "dependencies": ["list", "of", "dependencies"],
    "build_commands": ["command1"],
    "run_commands": ["command1"],
    "test_commands": ["test command"],
    "architecture_notes": "explanation of the chosen architecture"
}"#;

/// Compute a truncated SHA-256 of a generation prompt, recorded in the
/// session so a Project can be traced back to the request that produced it.
pub fn compute_prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

/// Build the full completion prompt for a generation request.
pub fn build_prompt(prompt: &str, language: &str, architecture: &str) -> String {
    format!(
        "{}\n\nProject Requirements: {}\nTarget Language: {}\nArchitecture Pattern: {}",
        GENERATION_SYSTEM_PROMPT, prompt, language, architecture
    )
}

/// Turns a (prompt, language, architecture) triple into a Project.
pub struct GenerationService {
    client: Arc<dyn CompletionClient>,
}

impl GenerationService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Call the model exactly once and parse the response into a Project.
    pub async fn generate(
        &self,
        prompt: &str,
        language: &str,
        architecture: &str,
    ) -> Result<Project, GenerationError> {
        let full_prompt = build_prompt(prompt, language, architecture);
        let raw = self.client.complete(&full_prompt).await?;
        let project = parse_project_response(&raw)?;
        info!(
            name = %project.name,
            files = project.files.len(),
            "project generated"
        );
        Ok(project)
    }
}

/// Parse a raw model response into a validated Project.
///
/// Required keys are checked before construction; nothing dynamic crosses
/// this boundary unvalidated.
pub fn parse_project_response(raw: &str) -> Result<Project, GenerationError> {
    let unparsable = |source: ExtractionError| GenerationError::UnparsableResponse {
        source,
        raw: raw.to_string(),
    };

    let value = extract_json(raw).map_err(unparsable)?;
    require_keys(&value, &["project_name", "description", "files"]).map_err(unparsable)?;

    let files =
        FileMap::from_json_value(&value["files"]).map_err(|e| file_map_error(e, raw))?;
    if files.is_empty() {
        return Err(GenerationError::EmptyProject);
    }

    Ok(Project {
        name: str_field(&value, "project_name"),
        description: str_field(&value, "description"),
        files,
        dependencies: string_list(&value, "dependencies"),
        build_commands: string_list(&value, "build_commands"),
        run_commands: string_list(&value, "run_commands"),
        test_commands: string_list(&value, "test_commands"),
        architecture_notes: str_field(&value, "architecture_notes"),
    })
}

/// Lift a FileMap construction failure into a generation error.
fn file_map_error(err: FileMapError, raw: &str) -> GenerationError {
    match err {
        FileMapError::InvalidPath(e) => GenerationError::InvalidPath(e.to_string()),
        shape => GenerationError::UnparsableResponse {
            source: ExtractionError::SchemaMismatch {
                key: format!("files ({shape})"),
            },
            raw: raw.to_string(),
        },
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_string()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value[key]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
