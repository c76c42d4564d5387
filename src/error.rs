//! Error types for pipeline construction and document execution.

use thiserror::Error;

/// Errors raised while building an extraction pipeline or running it over a document.
///
/// Construction-time variants reject the whole pipeline; `StageExecution` and
/// `FieldWrite` only abort the document being processed.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed pipeline configuration (missing key, wrong value type, ...)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Stage identifier could not be resolved by the registry
    #[error("Stage not found: {stage}")]
    StageNotFound { stage: String },

    /// Stage type resolved but its constructor failed
    #[error("Failed to instantiate stage {stage}: {reason}")]
    StageInstantiation { stage: String, reason: String },

    /// Raw settings payload could not be converted into the stage's settings type
    #[error("Failed to bind settings for stage {stage}: {reason}")]
    SettingsBinding { stage: String, reason: String },

    /// Stage rejected its bound settings in `configure`
    #[error("Failed to configure stage {stage}: {reason}")]
    StageConfiguration { stage: String, reason: String },

    /// A stage reported failure while processing a document
    #[error("Error extracting information with stage {stage}: {reason}")]
    StageExecution { stage: String, reason: String },

    /// Extracted values could not be written to the record
    #[error("Cannot write field '{field}': {reason}")]
    FieldWrite { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ExtractError {
    /// Returns true for errors that reject a pipeline before any document is processed.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            ExtractError::Configuration(_)
                | ExtractError::StageNotFound { .. }
                | ExtractError::StageInstantiation { .. }
                | ExtractError::SettingsBinding { .. }
                | ExtractError::StageConfiguration { .. }
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        ExtractError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
