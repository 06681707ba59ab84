//! Core type definitions with validation.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid build status value.
    #[error("invalid build status: {value}")]
    InvalidBuildStatus { value: String },
}

/// Tri-state outcome of a build, project or session.
///
/// Failures are data, never errors: callers inspect partially-succeeded
/// multi-target results through this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// No finish event has been observed yet.
    #[default]
    Unknown,
    Succeeded,
    Failed,
}

impl BuildStatus {
    /// Maps a reported success flag to a status.
    #[must_use]
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Succeeded } else { Self::Failed }
    }

    /// Returns `Some(true|false)` once known.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Succeeded => Some(true),
            Self::Failed => Some(false),
        }
    }

    /// Three-valued AND: a failure wins, and success needs both sides to
    /// have succeeded.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
            (Self::Succeeded, Self::Succeeded) => Self::Succeeded,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(ValidationError::InvalidBuildStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// A normalized, absolute project file path.
///
/// Normalization is purely lexical: backslashes become `/` off Windows,
/// relative paths are anchored at the current directory, and `.`/`..`
/// components are folded. Drive-letter and UNC paths recorded on Windows
/// stay absolute on every host. The file system is never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath(String);

impl ProjectPath {
    /// Normalizes and validates a project path.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = path.as_ref().trim();
        if raw.is_empty() {
            return Err(ValidationError::Empty {
                field: "project path",
            });
        }
        let path = separators(raw);
        let normalized = if is_rooted(&path) {
            normalize(&path)
        } else {
            let relative = Path::new(&path);
            let anchored = std::env::current_dir()
                .map(|cwd| cwd.join(relative))
                .unwrap_or_else(|_| relative.to_path_buf());
            normalize(&anchored.to_string_lossy())
        };
        Ok(Self(normalized.to_string_lossy().into_owned()))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path as a `Path`.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Directory containing the project file.
    pub fn directory(&self) -> &Path {
        self.as_path().parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Whether the file extension is one of `extensions` (case-insensitive,
    /// with or without a leading dot).
    pub fn has_extension(&self, extensions: &[String]) -> bool {
        self.as_path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }

    /// Resolves `relative` against this project's directory.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        resolve_path(self.directory(), relative)
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.0
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves `relative` against `base` and folds `.`/`..` lexically.
pub fn resolve_path(base: &Path, relative: &str) -> PathBuf {
    let relative = separators(relative);
    if is_rooted(&relative) {
        normalize(&relative)
    } else {
        normalize(&base.join(&relative).to_string_lossy())
    }
}

fn is_rooted(path: &str) -> bool {
    Path::new(path).is_absolute() || windows_root(path).is_some()
}

/// Folds `.`/`..` while keeping a Windows root intact.
fn normalize(path: &str) -> PathBuf {
    match windows_root(path) {
        Some((root, rest)) => {
            let rest = lexical_normalize(&Path::new("/").join(rest.trim_start_matches('/')));
            PathBuf::from(format!("{root}{}", rest.to_string_lossy()))
        }
        None => lexical_normalize(Path::new(path)),
    }
}

/// Splits a drive (`C:`) or UNC (`//server/share`) root off a path whose
/// separators are already `/`.
#[cfg(not(windows))]
fn windows_root(path: &str) -> Option<(&str, &str)> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
    {
        return Some(path.split_at(2));
    }

    let tail = path.strip_prefix("//")?;
    let server_len = tail.find('/')?;
    let share = &tail[server_len + 1..];
    let share_len = share.find('/').unwrap_or(share.len());
    if server_len == 0 || share_len == 0 {
        return None;
    }
    Some(path.split_at(2 + server_len + 1 + share_len))
}

// Native path handling already understands Windows roots
#[cfg(windows)]
const fn windows_root(_path: &str) -> Option<(&str, &str)> {
    None
}

#[cfg(windows)]
fn separators(path: &str) -> String {
    path.to_string()
}

#[cfg(not(windows))]
fn separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` never climbs above the root
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
