//! Error taxonomy for the build pipeline.
//!
//! Failure kinds map one-to-one onto the conditions the pipeline reports:
//! missing caller arguments are surfaced synchronously and never retried,
//! missing files abort the step for that page only, compile errors either
//! propagate (strict mode) or are downgraded to in-page diagnostics (dev
//! mode), and script failures during pre-rendering are always captured
//! rather than propagated.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required entry file argument was not provided by the caller.
    #[error("file must be defined")]
    UndefinedInput,

    /// A required output file argument was not provided by the caller.
    #[error("outfile must be defined")]
    UndefinedOutput,

    /// A referenced path does not exist on disk.
    #[error("file {path} doesn't exist")]
    MissingFile { path: String },

    /// The bundler rejected its input.
    #[error("{message}")]
    Compile { message: String },

    /// The emulated-DOM environment itself failed (not a page script error;
    /// those are captured in the execution report instead).
    #[error("script environment failure: {message}")]
    Script { message: String },

    /// A bounded wait for a resource expired.
    #[error("timed out after {millis}ms waiting for {path}")]
    Timeout { path: String, millis: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn missing_file(path: &Path) -> Self {
        BuildError::MissingFile {
            path: path.display().to_string(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        BuildError::Compile {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        BuildError::Script {
            message: message.into(),
        }
    }
}
