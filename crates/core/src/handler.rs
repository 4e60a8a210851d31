//! Error decoration handlers and their composition into chains
//!
//! A [`Handler`] either decorates an error, always producing an error
//! again, or discards it. Dropping an error therefore requires an
//! explicit [`Handler::Discard`] step; a decorator cannot lose an error
//! by accident.

use crate::errors::Error;
use crate::state::State;
use std::fmt;
use std::sync::Arc;

/// A decoration step: transforms an error, never removes it
pub trait Decorate: Send + Sync {
    /// Return the decorated error
    fn decorate(&self, state: &State<'_>, err: Error) -> Error;
}

impl<F> Decorate for F
where
    F: Fn(&State<'_>, Error) -> Error + Send + Sync,
{
    fn decorate(&self, state: &State<'_>, err: Error) -> Error {
        self(state, err)
    }
}

/// One step of a handler chain
#[derive(Clone)]
pub enum Handler {
    /// Transform the error and pass it on
    Decorate(Arc<dyn Decorate>),
    /// Drop the error; later steps do not run
    Discard,
}

impl Handler {
    /// Create a decorating handler from a function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&State<'_>, Error) -> Error + Send + Sync + 'static,
    {
        Handler::Decorate(Arc::new(f))
    }

    /// Create a handler that wraps the error with a fixed context message
    pub fn context(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(move |_state: &State<'_>, err: Error| err.context(message.clone()))
    }

    /// The handler that drops errors.
    ///
    /// Use it for failures that are known to be uninformative, such as an
    /// interim close superseded by a later authoritative one.
    #[must_use]
    pub fn discard() -> Self {
        Handler::Discard
    }

    /// Apply this step; `None` only for [`Handler::Discard`]
    pub fn apply(&self, state: &State<'_>, err: Error) -> Option<Error> {
        match self {
            Handler::Decorate(decorator) => Some(decorator.decorate(state, err)),
            Handler::Discard => {
                tracing::debug!(error = %err, phase = ?state.phase(), "handler discarded error");
                None
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Decorate(_) => f.write_str("Handler::Decorate(..)"),
            Handler::Discard => f.write_str("Handler::Discard"),
        }
    }
}

/// An immutable, cheaply clonable sequence of handlers
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Arc<[Handler]>,
}

impl HandlerChain {
    /// Create a chain applying `handlers` in order
    pub fn new(handlers: impl IntoIterator<Item = Handler>) -> Self {
        Self {
            handlers: handlers.into_iter().collect(),
        }
    }

    /// The identity chain
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Compose: `self` runs first, then `next`
    #[must_use]
    pub fn then(&self, next: &HandlerChain) -> HandlerChain {
        if next.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return next.clone();
        }
        Self::new(self.handlers.iter().chain(next.handlers.iter()).cloned())
    }

    /// Run the chain over `err`.
    ///
    /// Returns `None` only when a [`Handler::Discard`] step was reached.
    pub fn apply(&self, state: &State<'_>, err: Error) -> Option<Error> {
        self.handlers
            .iter()
            .try_fold(err, |err, handler| handler.apply(state, err))
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.iter()).finish()
    }
}

impl FromIterator<Handler> for HandlerChain {
    fn from_iter<I: IntoIterator<Item = Handler>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<Handler>> for HandlerChain {
    fn from(handlers: Vec<Handler>) -> Self {
        Self::new(handlers)
    }
}

impl From<Handler> for HandlerChain {
    fn from(handler: Handler) -> Self {
        Self::new([handler])
    }
}

impl<const N: usize> From<[Handler; N]> for HandlerChain {
    fn from(handlers: [Handler; N]) -> Self {
        Self::new(handlers)
    }
}
