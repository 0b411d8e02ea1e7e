//! Error types for template resolution and management

use std::path::PathBuf;

use stencil_common::JsonStoreError;
use thiserror::Error;

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised by the template subsystem
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A folder handed to the manager does not exist
    #[error("Template directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Identifier failed to parse
    #[error("Invalid template identifier '{identifier}': {message}")]
    InvalidIdentifier {
        /// The identifier as supplied
        identifier: String,
        /// Parser message
        message: String,
    },

    /// Neither a workspace nor a default template root is configured
    #[error("No template root configured (set a workspace directory or a default template folder)")]
    NoTemplateRoot,

    /// Caller passed an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A special folder's parent chain loops back on itself
    #[error("Special folder '{folder}' is its own ancestor")]
    SpecialFolderCycle {
        /// Folder at which the loop was detected
        folder: String,
    },

    /// Target of a move already exists
    #[error("Refusing to overwrite existing file: {0}")]
    AlreadyExists(PathBuf),

    /// Definition file could not be read or written
    #[error("Definition file error on {path}: {source}")]
    Definition {
        /// Path of the `.def` file
        path: PathBuf,
        /// Underlying store error
        source: JsonStoreError,
    },

    /// Filesystem operation failed
    #[error("IO error on {path} ({operation}): {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// What was being attempted
        operation: IoOperation,
        /// Underlying error
        source: std::io::Error,
    },

    /// Template could not be created from a file
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Reading a file or directory listing
    Read,
    /// Creating a directory
    CreateDir,
    /// Renaming or moving
    Move,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::CreateDir => write!(f, "create dir"),
            IoOperation::Move => write!(f, "move"),
        }
    }
}

impl TemplateError {
    /// Create an IO error
    pub fn io(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a definition error
    pub fn definition(path: impl Into<PathBuf>, source: JsonStoreError) -> Self {
        TemplateError::Definition {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::InvalidIdentifier {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

/// Outcome of asking an engine to turn a file into a template
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file is not something this engine handles
    #[error("Not a template for this engine: {path} ({reason})")]
    NotATemplate {
        /// File that was offered
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// The file is a template, but it (or its definition) is broken
    #[error("Malformed template {path}: {message}")]
    Malformed {
        /// File that failed to load
        path: PathBuf,
        /// What was wrong
        message: String,
    },

    /// The file could not be read
    #[error("IO error loading template {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

impl LoadError {
    /// Whether this error only means "not handled by this engine"
    pub fn is_not_a_template(&self) -> bool {
        matches!(self, LoadError::NotATemplate { .. })
    }
}

/// Result type for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors loading, saving or validating [`TemplateSettings`](crate::settings::TemplateSettings)
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_operation() {
        let err = TemplateError::io(
            "/tmp/x",
            IoOperation::CreateDir,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "IO error on /tmp/x (create dir): denied");
    }

    #[test]
    fn test_load_error_classification() {
        let not_template = LoadError::NotATemplate {
            path: PathBuf::from("a.txt"),
            reason: "unsupported extension".into(),
        };
        let malformed = LoadError::Malformed {
            path: PathBuf::from("a.hbs"),
            message: "bad definition".into(),
        };
        assert!(not_template.is_not_a_template());
        assert!(!malformed.is_not_a_template());
        assert!(matches!(TemplateError::from(malformed), TemplateError::Load(_)));
    }
}
