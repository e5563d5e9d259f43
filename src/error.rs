//! Module containing the definition of error types.

use thiserror::Error;

/// Enumeration of the different error kinds.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The input is not a valid package container.
    #[error("{message}")]
    ContainerParse {
        /// Error message.
        message: String,
    },
    /// One certificate blob could not be decoded.
    #[error("Failed to parse cert: {message}")]
    CertificateDecode {
        /// Error message.
        message: String,
    },
    /// The classifier could not be loaded or failed while predicting.
    #[error("{message}")]
    ModelUnavailable {
        /// Error message.
        message: String,
    },
    /// The upload was rejected before the analysis started.
    #[error("{message}")]
    UploadValidation {
        /// Error message.
        message: String,
    },
    /// Configuration error.
    #[error("there was an error in the configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl ErrorKind {
    /// Creates a container parse error.
    pub fn container_parse<S: Into<String>>(message: S) -> Self {
        Self::ContainerParse {
            message: message.into(),
        }
    }

    /// Creates a model error.
    pub fn model_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
        }
    }

    /// Creates an upload validation error.
    pub fn upload_validation<S: Into<String>>(message: S) -> Self {
        Self::UploadValidation {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
