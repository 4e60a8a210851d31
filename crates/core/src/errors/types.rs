//! Core error type definitions

/// Result type alias for errscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error accepted as the source of a reported failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for errscope operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A failure reported by caller code, usually through `must`
    #[error("{message}")]
    Failure {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// An error decorated with context by a handler
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// I/O failures, typically raised while releasing a resource
    #[error("{operation} failed: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Registration errors: a value without a usable release action
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A release strategy invoked an action the resource never declared
    #[error("resource '{resource}' does not support {capability}")]
    Unsupported {
        resource: String,
        capability: String,
    },

    /// Cause handed to error-aware releases while a panic unwinds the scope
    #[error("scope body panicked: {message}")]
    Panicked { message: String },

    /// Several errors kept together by the aggregate accumulation policy
    #[error("{}", format_aggregate(.errors))]
    Aggregate { errors: Vec<Error> },
}

fn format_aggregate(errors: &[Error]) -> String {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} errors occurred: {joined}", errors.len())
}
