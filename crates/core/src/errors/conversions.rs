//! Conversion implementations for error types

use super::types::{BoxError, Error};

// Kept explicit rather than #[from] so each conversion picks the variant that carries the most context
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io {
            operation: "io".to_string(),
            source: error,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Failure {
            message: format!("{error:#}"),
            source: Some(error.into()),
        }
    }
}

impl From<BoxError> for Error {
    fn from(error: BoxError) -> Self {
        Error::wrap(error)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::failure(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::failure(message)
    }
}
