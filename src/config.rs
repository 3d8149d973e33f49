//! Runtime configuration for the Oracle pipeline.
//!
//! State lives under `.oracle/` in the project directory: the persisted
//! session, per-cycle scratch directories, and generated artifacts.
//! Defaults can be overridden by an optional `.oracle/oracle.toml`; the
//! API key comes from the environment (a `.env` file is honored).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::errors::TransportError;
use crate::llm::GeminiClient;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub oracle_dir: PathBuf,
    pub session_file: PathBuf,
    pub scratch_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub model: String,
    pub llm_timeout: Duration,
    pub build_timeout: Duration,
    pub test_timeout: Duration,
    pub max_iterations: u32,
    pub verbose: bool,
}

/// Raw TOML structure for `.oracle/oracle.toml`.
#[derive(Debug, Default, Deserialize)]
struct OracleToml {
    llm: Option<LlmSection>,
    pipeline: Option<PipelineSection>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmSection {
    model: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSection {
    max_iterations: Option<u32>,
    build_timeout_seconds: Option<u64>,
    test_timeout_seconds: Option<u64>,
}

impl OracleToml {
    /// Load overrides from `.oracle/oracle.toml`, defaulting when absent.
    fn load(oracle_dir: &Path) -> Result<Self> {
        let path = oracle_dir.join("oracle.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let oracle_dir = project_dir.join(".oracle");
        let overrides = OracleToml::load(&oracle_dir)?;
        let llm = overrides.llm.unwrap_or_default();
        let pipeline = overrides.pipeline.unwrap_or_default();

        Ok(Self {
            session_file: oracle_dir.join("session.json"),
            scratch_dir: oracle_dir.join("scratch"),
            artifacts_dir: oracle_dir.join("artifacts"),
            model: llm.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(
                llm.timeout_seconds.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
            build_timeout: Duration::from_secs(
                pipeline
                    .build_timeout_seconds
                    .unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS),
            ),
            test_timeout: Duration::from_secs(
                pipeline
                    .test_timeout_seconds
                    .unwrap_or(DEFAULT_TEST_TIMEOUT_SECS),
            ),
            max_iterations: pipeline.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            oracle_dir,
            project_dir,
            verbose,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.scratch_dir)
            .context("Failed to create scratch directory")?;
        std::fs::create_dir_all(&self.artifacts_dir)
            .context("Failed to create artifacts directory")?;
        Ok(())
    }

    /// The LLM credential. A valid key must be available before the
    /// Generation Service is invoked; nothing else needs it.
    pub fn api_key(&self) -> Result<String, TransportError> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(TransportError::MissingCredential)
    }

    /// Build the completion client from this configuration.
    pub fn completion_client(&self) -> Result<GeminiClient, TransportError> {
        GeminiClient::new(self.api_key()?, self.model.clone(), self.llm_timeout)
    }
}
