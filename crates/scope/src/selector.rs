//! Choosing the release action for a deferred value
//!
//! Selection happens in two steps. At registration a [`Selector`] maps the
//! value's declared [`Capabilities`] to a [`Strategy`]; at unwind time the
//! strategy resolves to a concrete [`Action`] from whether the scope is
//! failing.

use errscope_core::{Capabilities, Error, Resource, Result, State};

/// Release plan fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Always the plain release
    Close,
    /// Always the error-aware release; the cause is `None` on success
    CloseWithError,
    /// Error-aware release when failing, plain release otherwise
    AbortOnFailure,
    /// Release a lock
    Unlock,
}

/// Release action invoked for one entry during unwind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Close,
    CloseWithError,
    Unlock,
}

impl Strategy {
    /// Capabilities a value must declare for this strategy to be usable
    #[must_use]
    pub fn required(self) -> Capabilities {
        match self {
            Strategy::Close => Capabilities::CLOSE,
            Strategy::CloseWithError => Capabilities::CLOSE_WITH_ERROR,
            Strategy::AbortOnFailure => Capabilities::CLOSE | Capabilities::CLOSE_WITH_ERROR,
            Strategy::Unlock => Capabilities::UNLOCK,
        }
    }

    /// Pick the action for the current failure state
    #[must_use]
    pub fn resolve(self, failing: bool) -> Action {
        match self {
            Strategy::AbortOnFailure if failing => Action::CloseWithError,
            Strategy::AbortOnFailure | Strategy::Close => Action::Close,
            Strategy::CloseWithError => Action::CloseWithError,
            Strategy::Unlock => Action::Unlock,
        }
    }

    pub(crate) fn release<R: Resource>(self, value: R, state: &State<'_>) -> Result<()> {
        match self.resolve(state.is_failing()) {
            Action::Close => value.close(),
            Action::CloseWithError => value.close_with_error(state.err()),
            Action::Unlock => {
                value.unlock();
                Ok(())
            }
        }
    }
}

/// Policy mapping a capability set to a release strategy.
///
/// Selectors are shared read-only by every scope a coordinator runs.
pub trait Selector: Send + Sync {
    /// `None` means the value cannot be released automatically
    fn select(&self, capabilities: Capabilities) -> Option<Strategy>;
}

impl<F> Selector for F
where
    F: Fn(Capabilities) -> Option<Strategy> + Send + Sync,
{
    fn select(&self, capabilities: Capabilities) -> Option<Strategy> {
        self(capabilities)
    }
}

/// Default policy: prefer the release least likely to leave partial state.
///
/// A value that can both close and close-with-error is aborted whenever the
/// scope is failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conservative;

impl Selector for Conservative {
    fn select(&self, capabilities: Capabilities) -> Option<Strategy> {
        let plain = capabilities.contains(Capabilities::CLOSE);
        let aware = capabilities.contains(Capabilities::CLOSE_WITH_ERROR);
        match (plain, aware) {
            (true, true) => Some(Strategy::AbortOnFailure),
            (false, true) => Some(Strategy::CloseWithError),
            (true, false) => Some(Strategy::Close),
            (false, false) if capabilities.contains(Capabilities::UNLOCK) => Some(Strategy::Unlock),
            (false, false) => None,
        }
    }
}

/// Opt-in policy that uses the plain close whenever one exists, even on failure
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFirst;

impl Selector for PlainFirst {
    fn select(&self, capabilities: Capabilities) -> Option<Strategy> {
        if capabilities.contains(Capabilities::CLOSE) {
            Some(Strategy::Close)
        } else {
            Conservative.select(capabilities)
        }
    }
}

/// Run `selector` for a value of type `name` and check its answer
pub(crate) fn select(
    selector: &dyn Selector,
    name: &str,
    capabilities: Capabilities,
) -> Result<Strategy> {
    let strategy = selector.select(capabilities).ok_or_else(|| {
        Error::configuration(format!(
            "cannot defer '{name}': no release action for capabilities {:?}",
            capabilities.names()
        ))
    })?;
    check(strategy, name, capabilities)
}

/// Validate an explicitly requested strategy against what the type declares
pub(crate) fn check(strategy: Strategy, name: &str, capabilities: Capabilities) -> Result<Strategy> {
    if capabilities.contains(strategy.required()) {
        Ok(strategy)
    } else {
        Err(Error::configuration(format!(
            "cannot defer '{name}' with {strategy:?}: it declares only {:?}",
            capabilities.names()
        )))
    }
}
