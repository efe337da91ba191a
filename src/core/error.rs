use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Central error type for the workspace pipeline.
/// Every module returns `Result<T, WorkspaceError>`.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Version metadata ────────────────────────────────
    #[error("{}", version_not_found_message(.version, .latest.as_deref()))]
    VersionNotFound {
        version: String,
        latest: Option<String>,
    },

    #[error("Bundler metadata error: {0}")]
    Bundler(String),

    // ── Serialization ───────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Bytecode ────────────────────────────────────────
    #[error("Invalid class file: {0}")]
    ClassFormat(String),

    #[error("Malformed class {entry} in {artifact}: {reason}")]
    MalformedClass {
        entry: String,
        artifact: String,
        reason: String,
    },

    #[error("Ambiguous merge: client and server disagree on the contents of {entry}")]
    AmbiguousMerge { entry: String },

    // ── Mappings / wideners ─────────────────────────────
    #[error("Failed to read {format} mappings: {message}")]
    Mappings {
        format: &'static str,
        message: String,
    },

    #[error("Invalid access widener at line {line}: {message}")]
    AccessWidener { line: usize, message: String },

    // ── Configuration ───────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // ── Resolution ──────────────────────────────────────
    #[error("Failed to {step} for {artifact}: {source}")]
    Resolution {
        artifact: String,
        step: &'static str,
        source: Box<WorkspaceError>,
    },

    /// Failure observed through a memoized computation shared between callers.
    #[error(transparent)]
    Shared(#[from] Arc<WorkspaceError>),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

impl From<std::io::Error> for WorkspaceError {
    fn from(source: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<noak::error::DecodeError> for WorkspaceError {
    fn from(error: noak::error::DecodeError) -> Self {
        WorkspaceError::ClassFormat(error.to_string())
    }
}

impl From<noak::error::EncodeError> for WorkspaceError {
    fn from(error: noak::error::EncodeError) -> Self {
        WorkspaceError::ClassFormat(error.to_string())
    }
}

impl WorkspaceError {
    /// Tag an error with the artifact and pipeline step it occurred in.
    pub fn during(self, artifact: impl Into<String>, step: &'static str) -> Self {
        WorkspaceError::Resolution {
            artifact: artifact.into(),
            step,
            source: Box::new(self),
        }
    }

    /// Whether this error, possibly wrapped, reports a missing version.
    pub fn is_version_not_found(&self) -> bool {
        match self {
            WorkspaceError::VersionNotFound { .. } => true,
            WorkspaceError::Resolution { source, .. } => source.is_version_not_found(),
            WorkspaceError::Shared(inner) => inner.is_version_not_found(),
            _ => false,
        }
    }
}

fn version_not_found_message(version: &str, latest: Option<&str>) -> String {
    match latest {
        Some(latest) => format!(
            "Minecraft version '{}' could not be found. The latest release is '{}'",
            version, latest
        ),
        None => format!("Minecraft version '{}' could not be found", version),
    }
}

/// Attach a path to raw IO errors.
pub trait IoResultExt<T> {
    fn at(self, path: &Path) -> WorkspaceResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> WorkspaceResult<T> {
        self.map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_errors_keep_context() {
        let err = WorkspaceError::AmbiguousMerge {
            entry: "a/B.class".into(),
        }
        .during("client_m-obf", "merge jars");
        let message = err.to_string();
        assert!(message.contains("merge jars"));
        assert!(message.contains("client_m-obf"));
        assert!(message.contains("a/B.class"));
    }

    #[test]
    fn not_found_suggests_latest_release() {
        let err = WorkspaceError::VersionNotFound {
            version: "1.99".into(),
            latest: Some("1.20.1".into()),
        };
        assert!(err.to_string().contains("1.20.1"));
        let shared = WorkspaceError::Shared(Arc::new(err.during("x", "resolve version")));
        assert!(shared.is_version_not_found());
    }
}
