//! Builder and inspection methods for errors

use super::types::{BoxError, Error};
use std::any::Any;

// Helper methods for creating errors with context
impl Error {
    /// Create a reported failure from a message
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Error::Failure {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error as a reported failure, keeping it as the source
    #[must_use]
    pub fn wrap(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Error::Failure {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Add a context layer on top of this error
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an I/O error for a named operation
    #[must_use]
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported capability error
    #[must_use]
    pub fn unsupported(resource: impl Into<String>, capability: impl Into<String>) -> Self {
        Error::Unsupported {
            resource: resource.into(),
            capability: capability.into(),
        }
    }

    /// Describe a panic payload as an error
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked { message }
    }

    /// Combine two errors, flattening nested aggregates so the result stays one level deep
    #[must_use]
    pub fn aggregate(first: Error, second: Error) -> Self {
        let mut errors = Vec::with_capacity(2);
        for err in [first, second] {
            match err {
                Error::Aggregate { errors: inner } => errors.extend(inner),
                other => errors.push(other),
            }
        }
        Error::Aggregate { errors }
    }

    /// Follow context layers down to the error that was originally reported
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// The errors held by an aggregate, or this error alone
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        match self {
            Error::Aggregate { errors } => errors,
            other => std::slice::from_ref(other),
        }
    }

    /// Whether the root cause is a configuration error
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.root_cause(), Error::Configuration { .. })
    }
}
