//! What happens when a release fails after the scope already has an error

use errscope_core::Error;
use serde::{Deserialize, Serialize};

/// Accumulation policy for release errors raised during unwind.
///
/// With no terminal error yet, every policy adopts the release error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Keep the first error; later release errors are dropped
    #[default]
    FirstCause,
    /// Replace the terminal error with the latest release error
    LastCause,
    /// Keep every error in an [`Error::Aggregate`]
    Aggregate,
}

impl Accumulation {
    /// Fold `next` into the current terminal error.
    ///
    /// Returns the new terminal error and the error that was dropped, if any.
    #[must_use]
    pub fn combine(self, current: Option<Error>, next: Error) -> (Error, Option<Error>) {
        let Some(current) = current else {
            return (next, None);
        };
        match self {
            Accumulation::FirstCause => (current, Some(next)),
            Accumulation::LastCause => (next, Some(current)),
            Accumulation::Aggregate => (Error::aggregate(current, next), None),
        }
    }
}
