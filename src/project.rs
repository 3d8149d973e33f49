//! Core data model: the generated Project, its ordered file map, and the
//! reports produced by running its build/test commands.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A path rejected at the FileMap boundary.
///
/// Validation happens on insertion so nothing downstream (materializer,
/// archive export, repair overlay) has to re-check for escapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid project path '{path}': {reason}")]
pub struct InvalidPath {
    pub path: String,
    pub reason: &'static str,
}

/// Failure to build a FileMap from parsed JSON.
#[derive(Debug, Error)]
pub enum FileMapError {
    #[error("expected a JSON object of path to content")]
    NotAnObject,

    #[error("content for '{path}' is not a string")]
    NonStringContent { path: String },

    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),
}

/// Insertion-ordered mapping from relative POSIX path to UTF-8 file content.
///
/// Invariants, enforced on insertion:
/// - no absolute paths
/// - no `..` segments
/// - no two keys that normalize to the same path (later inserts overwrite
///   in place, keeping the original position)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    entries: Vec<(String, String)>,
}

/// Normalize a relative path: drop `.` segments and redundant separators.
/// Returns the reason string on rejection.
fn normalize_path(path: &str) -> Result<String, &'static str> {
    if path.is_empty() {
        return Err("empty path");
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err("absolute paths are not allowed");
    }
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err("path escapes the project root"),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err("empty path");
    }
    Ok(segments.join("/"))
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, validating the path. Overwrites in place if the
    /// normalized path already exists.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), InvalidPath> {
        let raw = path.into();
        let normalized = normalize_path(&raw).map_err(|reason| InvalidPath {
            path: raw.clone(),
            reason,
        })?;
        let content = content.into();
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == normalized) {
            entry.1 = content;
        } else {
            self.entries.push((normalized, content));
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        let normalized = normalize_path(path).ok()?;
        self.entries
            .iter()
            .find(|(p, _)| *p == normalized)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Overlay another map onto this one: overwrite existing keys, insert
    /// new ones, never delete. Paths in `other` are already validated.
    pub fn merge(&mut self, other: &FileMap) {
        for (path, content) in other.iter() {
            if let Some(entry) = self.entries.iter_mut().find(|(p, _)| p == path) {
                entry.1 = content.to_string();
            } else {
                self.entries.push((path.to_string(), content.to_string()));
            }
        }
    }

    /// Total line count across all files, for status summaries.
    pub fn total_lines(&self) -> usize {
        self.entries.iter().map(|(_, c)| c.lines().count()).sum()
    }

    /// Build a FileMap from a parsed JSON object of path → content,
    /// preserving key order and validating every path.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, FileMapError> {
        let object = value.as_object().ok_or(FileMapError::NotAnObject)?;
        let mut files = FileMap::new();
        for (path, content) in object {
            let text = content.as_str().ok_or_else(|| FileMapError::NonStringContent {
                path: path.clone(),
            })?;
            files.insert(path.clone(), text)?;
        }
        Ok(files)
    }
}

impl Serialize for FileMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, content) in &self.entries {
            map.serialize_entry(path, content)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FileMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FileMapVisitor;

        impl<'de> Visitor<'de> for FileMapVisitor {
            type Value = FileMap;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of relative path to file content")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FileMap, A::Error> {
                let mut files = FileMap::new();
                while let Some((path, content)) = access.next_entry::<String, String>()? {
                    files
                        .insert(path, content)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(files)
            }
        }

        deserializer.deserialize_map(FileMapVisitor)
    }
}

/// The generated multi-file project plus its declared commands.
///
/// Created by the Generation Service; mutated in place only by the Repair
/// Service's sparse overlay. Exactly one Project is current per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub files: FileMap,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_commands: Vec<String>,
    #[serde(default)]
    pub run_commands: Vec<String>,
    #[serde(default)]
    pub test_commands: Vec<String>,
    #[serde(default)]
    pub architecture_notes: String,
}

/// Outcome of running a project's test commands.
///
/// Invariant: `success == failed_tests.is_empty()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub success: bool,
    /// `Command: <cmd>` label plus captured stdout, in command order.
    pub output: String,
    /// Captured stderr from failing commands only.
    pub errors: String,
    /// The literal command lines that failed.
    pub failed_tests: Vec<String>,
}

/// Outcome of running a project's build commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub success: bool,
    pub output: String,
}

/// A sparse file overlay produced by the Repair Service.
#[derive(Debug, Clone)]
pub struct RepairPatch {
    pub fixed_files: FileMap,
    pub explanation: String,
}
