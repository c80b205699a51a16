//! Error types for wb.
//!
//! All errors use `thiserror` so callers get proper error chains. Variants follow
//! the operator-facing taxonomy: validation and conflict errors on the registry,
//! lookup errors during target resolution, and pre-flight / start errors from the
//! lifecycle orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wb operations.
pub type Result<T> = std::result::Result<T, WbError>;

/// Main error type for wb.
#[derive(Error, Debug)]
pub enum WbError {
    // Registry errors
    #[error("Validation failed for '{id}': {}", violations.join(", "))]
    Validation { id: String, violations: Vec<String> },

    #[error("Tenant with ID '{id}' already exists")]
    Conflict { id: String },

    #[error("Tenant or tag '{target}' not found")]
    NotFound { target: String },

    #[error("No tenants found with {kind} '{value}'")]
    NoMatch { kind: &'static str, value: String },

    #[error("Invalid registry file at {path:?}: {source}")]
    RegistryFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // Pre-flight errors
    #[error("Proxy port mismatch for '{tenant}': config has {proxy_port}, tenant uses {port}")]
    ConfigMismatch { tenant: String, proxy_port: u32, port: u32 },

    #[error("Directories not ready for '{tenant}': missing {path:?}")]
    NotReady { tenant: String, path: PathBuf },

    // Container errors
    #[error("Failed to start container {container}: {reason}")]
    ContainerStart { container: String, reason: String },

    #[error("Command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WbError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True for lookup failures that only affect a single target in a batch.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_violations() {
        let err = WbError::Validation {
            id: "demo".into(),
            violations: vec!["Label is required".into(), "Server version is required".into()],
        };
        assert_eq!(
            err.to_string(),
            "Validation failed for 'demo': Label is required, Server version is required"
        );
    }

    #[test]
    fn test_no_match_message() {
        let err = WbError::NoMatch { kind: "tag", value: "prod".into() };
        assert_eq!(err.to_string(), "No tenants found with tag 'prod'");
    }
}
