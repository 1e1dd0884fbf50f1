//! Error types for the render bridge

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while booting the runtime or rendering a chart
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A script asset could not be read
    #[error("Failed to load script asset {asset:?}: {reason}")]
    AssetLoad { asset: String, reason: String },

    /// A script asset failed to parse
    #[error("Failed to parse script asset {asset:?}: {reason}")]
    AssetParse { asset: String, reason: String },

    /// A script asset threw while executing
    #[error("Failed to execute script asset {asset:?}: {reason}")]
    AssetExecution { asset: String, reason: String },

    /// The loaded scripts do not define a callable entry point
    #[error("Script entry point {0:?} is missing or not callable")]
    MissingEntryPoint(String),

    /// Failed to initialize the runtime
    #[error("Runtime initialization failed: {0}")]
    InitializationError(String),

    /// Caller input could not be handed to the runtime
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The data payload could not be serialized
    #[error("Failed to serialize data: {0}")]
    DataError(#[from] serde_json::Error),

    /// The charting engine rejected or failed the render; carries its text verbatim
    #[error("{0}")]
    RenderError(String),

    /// The script went idle without reporting success or failure
    #[error("Script finished without reporting a result")]
    NoCompletion,

    /// The caller cancelled the render before it completed
    #[error("Render cancelled")]
    Cancelled,

    /// The caller's deadline passed before the render completed
    #[error("Render deadline exceeded")]
    DeadlineExceeded,

    /// The drawing surface could not be created or read
    #[error("Drawing surface error: {0}")]
    SurfaceError(String),

    /// The final pixel buffer could not be encoded
    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    /// The runtime thread is gone (closed, crashed, or discarded)
    #[error("Script runtime is unavailable")]
    RuntimeUnavailable,
}

impl Error {
    /// True when the error came from the caller's cancel token rather than the engine.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguishable_from_engine_failure() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(Error::DeadlineExceeded.is_cancellation());
        assert!(!Error::RenderError("Error: bad spec".into()).is_cancellation());
        assert!(!Error::NoCompletion.is_cancellation());
    }

    #[test]
    fn render_error_text_is_verbatim() {
        let err = Error::RenderError("SyntaxError: unexpected token".into());
        assert_eq!(err.to_string(), "SyntaxError: unexpected token");
    }

    #[test]
    fn asset_errors_name_the_asset() {
        let err = Error::AssetParse { asset: "vega.min.js".into(), reason: "unexpected token".into() };
        assert!(err.to_string().contains("vega.min.js"));
    }
}
