//! Error types for exm-core

use std::path::PathBuf;

/// Result type for exm-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in exm-core operations.
///
/// Persistence failures are deliberately absent: a config that cannot be
/// written back is logged and swallowed at the save site, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Extension absent from all three scopes. Recoverable; the caller may
    /// prompt for an install.
    #[error("extension '{id}' not found in namespace '{namespace}', try installing it with 'exm install {id}'")]
    NotFound { id: String, namespace: String },

    /// A module was found and loaded but is not one of our extensions, or
    /// declares a different id than requested. Fatal; never retried at a
    /// lower scope, since it indicates a name collision rather than absence.
    #[error("module at {path} is not a valid extension: {reason}")]
    ShapeMismatch { path: PathBuf, reason: String },

    /// Namespace already registered in this process.
    #[error("namespace '{namespace}' is already registered")]
    DuplicateNamespace { namespace: String },

    /// Composite extension identity already registered in this process.
    #[error("extension '{identity}' is already registered")]
    DuplicateExtension { identity: String },

    /// A second host tried to claim the master role.
    #[error("cannot register '{namespace}' as master: a master namespace is already set")]
    MasterAlreadySet { namespace: String },

    /// Namespace or extension id omitted or empty at registration time.
    #[error("missing required option: {option}")]
    MissingRequiredOption { option: &'static str },

    /// The external package manager invocation failed.
    #[error("external command '{command}' failed{}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    ExternalTool {
        command: String,
        exit_code: Option<i32>,
    },

    /// Filesystem error from exm-fs
    #[error(transparent)]
    Fs(#[from] exm_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
