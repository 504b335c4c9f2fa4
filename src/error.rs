//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while analyzing, planning, capturing or assembling
///
/// Only configuration, root resolution and extraction errors abort a run.
/// Capture-level errors are turned into rule-trace outcomes by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize the rendering session
    #[error("Session initialization failed: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to load the document
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// The explicit root selector matched nothing
    #[error("Root element not found for selector `{0}`")]
    RootNotFound(String),

    /// Nothing visible to capture
    #[error("Document has no visible content")]
    NoVisibleContent,

    /// A single node could not be extracted; the analysis tree would be partial
    #[error("Extraction failed at {path}: {reason}")]
    ExtractionError { path: String, reason: String },

    /// Failed to run a script in the page
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Failed to capture a region
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Screenshot or viewport operation failed
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// I/O failure while writing outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),
}

impl Error {
    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::ScriptError(_) | Error::CaptureError(_) | Error::RenderError(_)
        )
    }

    /// Label an extraction failure with the node's structural path
    pub fn extraction(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ExtractionError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_are_recoverable() {
        assert!(!Error::CaptureError("gone".into()).is_fatal());
        assert!(!Error::ScriptError("threw".into()).is_fatal());
        assert!(Error::RootNotFound("#app".into()).is_fatal());
        assert!(Error::NoVisibleContent.is_fatal());
    }

    #[test]
    fn extraction_error_carries_path() {
        let err = Error::extraction("html/body[0]/div[2]", "bad colour");
        assert_eq!(
            err.to_string(),
            "Extraction failed at html/body[0]/div[2]: bad colour"
        );
    }
}
