//! Typed error hierarchy for the Oracle pipeline.
//!
//! One enum per subsystem:
//! - `ExtractionError` — structured-response extraction failures
//! - `TransportError` — LLM completion call failures
//! - `GenerationError` / `RepairError` — service-level failures
//! - `MaterializeError` — per-file materialization failures (collected, not raised)
//! - `CommandError` — per-command execution failures (collected, not raised)

use thiserror::Error;

/// Errors from parsing an LLM free-text response into structured JSON.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No JSON structure found in response")]
    NoStructureFound,

    #[error("Candidate text is not valid JSON: {source}")]
    MalformedJson {
        /// The raw candidate substring, kept so callers can show it to the user.
        candidate: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response JSON is missing required key '{key}'")]
    SchemaMismatch { key: String },
}

/// Errors from the LLM completion boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No API key configured. Set GEMINI_API_KEY in the environment or a .env file")]
    MissingCredential,

    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion API returned no text candidates")]
    EmptyResponse,
}

/// Errors from the Generation Service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Could not parse generation response: {source}")]
    UnparsableResponse {
        #[source]
        source: ExtractionError,
        /// Full raw response text, surfaced verbatim for manual recovery.
        raw: String,
    },

    #[error("Model returned a project with no files")]
    EmptyProject,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid file path in generated project: {0}")]
    InvalidPath(String),
}

/// Errors from the Repair Service.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Could not parse repair response: {source}")]
    UnparsableResponse {
        #[source]
        source: ExtractionError,
        raw: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid file path in repair patch: {0}")]
    InvalidPath(String),
}

/// Per-file materialization failures. These are collected into a
/// `MaterializeReport`, never raised for the batch.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Permission denied writing {path}")]
    PermissionDenied { path: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Per-command execution failures. Collected into a `RunReport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to spawn: {reason}")]
    SpawnFailed { reason: String },
}
