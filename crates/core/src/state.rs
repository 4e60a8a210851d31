//! Read-only snapshot of a scope handed to handlers and release actions

use crate::errors::Error;

/// Where in a scope's life an error is being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The body is still running; the error comes from `must` or `handle`
    Body,
    /// The defer stack is draining; the error comes from a release action
    Unwind,
    /// The stack is empty and the terminal error is being finalised
    Exit,
}

/// Snapshot of scope state at the moment a handler or release action runs
#[derive(Debug, Clone, Copy)]
pub struct State<'a> {
    err: Option<&'a Error>,
    panicking: bool,
    phase: Phase,
}

impl<'a> State<'a> {
    /// Create a snapshot
    #[must_use]
    pub fn new(phase: Phase, err: Option<&'a Error>, panicking: bool) -> Self {
        Self {
            err,
            panicking,
            phase,
        }
    }

    /// State of a body that has not failed
    #[must_use]
    pub fn body() -> State<'static> {
        State {
            err: None,
            panicking: false,
            phase: Phase::Body,
        }
    }

    /// The error the scope is currently failing with, if any.
    ///
    /// While a panic unwinds the scope this is an [`Error::Panicked`]
    /// describing the payload.
    #[must_use]
    pub fn err(&self) -> Option<&'a Error> {
        self.err
    }

    /// Whether the scope is unwinding because of an error or a panic
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.err.is_some() || self.panicking
    }

    /// Whether a foreign panic is unwinding through the scope
    #[must_use]
    pub fn is_panicking(&self) -> bool {
        self.panicking
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}
