//! Error types for configuration and input-file handling.
//!
//! Everything here is detected before any sampling begins; the process
//! reports the offending file, line, or field and exits. Runtime errors
//! inside the engine surface as [`ExecError`] and convert losslessly.

use thiserror::Error;

use ergonet_core::ExecError;

/// Errors raised while reading configuration, network, or attribute
/// inputs, or while writing result files.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FrontendError {
    /// Bad or contradictory configuration. The message carries the line
    /// number where one is known.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input data with its location.
    #[error("{file}:{line}: {message}")]
    Input {
        file: String,
        line: usize,
        message: String,
    },

    /// Filesystem failure, tagged with the path involved.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An engine error propagated unchanged.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl FrontendError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn input(
        file: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Input {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}
