//! Error types for the bridge core.

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge core.
///
/// Missing dispatch targets are never errors; they resolve to silent
/// no-ops. The variants here cover the faults that do surface: module
/// methods failing mid-dispatch, timer bodies failing mid-batch, and
/// payloads that do not have the shape the wire protocol promises.
#[derive(Error, Debug)]
pub enum Error {
    /// A named module method failed during dispatch. Propagates to the
    /// native caller.
    #[error("Module error: {module}.{method}: {message}")]
    Module {
        module: String,
        method: String,
        message: String,
    },

    /// A timer body failed during batch execution. Reported to the
    /// exception sink; the batch continues.
    #[error("Timer error: timer {timer_id}: {message}")]
    Timer { timer_id: u64, message: String },

    /// A registered callback failed during invocation.
    #[error("Callback error: callback {id}: {message}")]
    Callback { id: u64, message: String },

    /// A dispatch payload did not have the expected shape.
    #[error("Payload error: {0}")]
    Payload(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),
}

impl Error {
    /// Create a module dispatch error.
    pub fn module(
        module: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Module {
            module: module.into(),
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a timer execution error.
    pub fn timer(timer_id: u64, message: impl Into<String>) -> Self {
        Self::Timer {
            timer_id,
            message: message.into(),
        }
    }

    /// Create a callback invocation error.
    pub fn callback(id: u64, message: impl Into<String>) -> Self {
        Self::Callback {
            id,
            message: message.into(),
        }
    }

    /// Create a payload shape error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}
