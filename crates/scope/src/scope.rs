//! The run scope: early exit, deferred releases and the unwind
//!
//! A [`Scope`] is lent to the body passed to
//! [`Coordinator::run`](crate::Coordinator::run). Operations that may end
//! the body return `Result<_, Exit>`; propagating the [`Exit`] with `?`
//! leaves the body immediately, and `run` turns it back into the returned
//! error once every deferred release has run.

use crate::coordinator::Settings;
use crate::selector::{self, Strategy};
use crate::stack::{DeferStack, Entry};
use errscope_core::{Error, HandlerChain, Phase, Resource, Result, State};
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Early-exit signal produced by a failing scope operation.
///
/// Only a scope can create one. Return it from the body (usually with `?`)
/// to stop the body and unwind the scope. An `Exit` is branded with the
/// scope that made it, so an enclosing scope's exit cannot be returned
/// from a nested body; hand the nested result to the enclosing scope's
/// `must` instead.
///
/// ```
/// use errscope::Error;
///
/// let result = errscope::run(|outer| {
///     let nested = errscope::run(|inner| inner.must(Err::<(), _>(Error::failure("disk full"))));
///     outer.must(nested)?;
///     unreachable!("the failing must ends the outer body");
/// });
///
/// assert_eq!(result.unwrap_err().to_string(), "disk full");
/// ```
///
/// ```compile_fail
/// use errscope::Error;
///
/// let _ = errscope::run(|outer| {
///     let _ = errscope::run(|_inner| {
///         outer.must(Err::<(), _>(Error::failure("outer failure")))?;
///         Ok(())
///     });
///     Ok(())
/// });
/// ```
#[must_use = "an Exit only ends the body when it is returned"]
pub struct Exit<'scope> {
    error: Option<Error>,
    _scope: PhantomData<fn(&'scope ()) -> &'scope ()>,
}

impl Exit<'_> {
    fn new(error: Option<Error>) -> Self {
        Self {
            error,
            _scope: PhantomData,
        }
    }

    /// The decorated error carried out of the body; `None` if it was discarded
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}

impl fmt::Debug for Exit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exit").field("error", &self.error).finish()
    }
}

/// How a body left its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitKind {
    /// The body returned `Ok(())`
    Completed,
    /// The body returned an [`Exit`]
    Reported,
    /// The body panicked, or re-raised a panic from a nested scope
    Panicked,
}

type Outcome<'scope> = std::thread::Result<std::result::Result<(), Exit<'scope>>>;

/// Handle to a value owned by the defer stack.
///
/// The handle cannot outlive the body it was created in, and the value is
/// only released after the body has returned.
pub struct Deferred<'s, R> {
    slot: Rc<RefCell<Option<R>>>,
    _scope: PhantomData<&'s ()>,
}

const RELEASED: &str = "deferred value is only released after the body returns";

impl<'s, R> Deferred<'s, R> {
    /// Immutably borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, R> {
        Ref::map(self.slot.borrow(), |slot| slot.as_ref().expect(RELEASED))
    }

    /// Mutably borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, R> {
        RefMut::map(self.slot.borrow_mut(), |slot| slot.as_mut().expect(RELEASED))
    }
}

impl<R: fmt::Debug> fmt::Debug for Deferred<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&self.slot).finish()
    }
}

/// One execution of a coordinator body.
///
/// `'scope` brands the scope and everything it hands out; `'env` bounds
/// the values it may release.
pub struct Scope<'scope, 'env: 'scope> {
    settings: Arc<Settings>,
    stack: RefCell<DeferStack<'env>>,
    _scope: PhantomData<&'scope mut &'scope ()>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    pub(crate) fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            stack: RefCell::new(DeferStack::default()),
            _scope: PhantomData,
        }
    }

    /// Number of releases still pending
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unwrap `result`, or leave the body with its error.
    ///
    /// `Ok` values pass through without touching the scope.
    pub fn must<T, E>(
        &self,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, Exit<'scope>>
    where
        E: Into<Error>,
    {
        self.must_with(result, HandlerChain::empty())
    }

    /// Like [`Scope::must`], decorating the error with call-site handlers.
    ///
    /// The coordinator's default handlers are applied later, once, when the
    /// scope exits. If the call-site handlers discard the error the body
    /// still stops, but the scope exits without an error.
    pub fn must_with<T, E>(
        &self,
        result: std::result::Result<T, E>,
        handlers: impl Into<HandlerChain>,
    ) -> std::result::Result<T, Exit<'scope>>
    where
        E: Into<Error>,
    {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let handlers: HandlerChain = handlers.into();
                let decorated = handlers.apply(&State::body(), err.into());
                if decorated.is_none() {
                    debug!("call-site handlers discarded the error; leaving scope cleanly");
                }
                Err(Exit::new(decorated))
            }
        }
    }

    /// Decorate `err` with call-site handlers followed by the default chain,
    /// without leaving the body.
    ///
    /// The result already carries the defaults. Reporting it through
    /// [`Scope::must`] applies them a second time when the scope exits.
    pub fn handle(&self, err: impl Into<Error>, handlers: impl Into<HandlerChain>) -> Option<Error> {
        let handlers: HandlerChain = handlers.into();
        handlers
            .then(&self.settings.handlers)
            .apply(&State::body(), err.into())
    }

    /// Defer the release of `value`, chosen by the coordinator's selector.
    ///
    /// A type without a usable release action is a configuration error,
    /// reported immediately.
    pub fn defer_value<R>(
        &self,
        value: R,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        self.defer_value_with(value, HandlerChain::empty())
    }

    /// Like [`Scope::defer_value`]; release errors pass through `handlers`
    pub fn defer_value_with<R>(
        &self,
        value: R,
        handlers: impl Into<HandlerChain>,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        let name = std::any::type_name::<R>();
        let strategy = selector::select(self.settings.selector.as_ref(), name, R::CAPABILITIES)
            .map_err(|err| Exit::new(Some(err)))?;
        Ok(self.push(value, strategy, handlers.into()))
    }

    /// Always release `value` with its plain close, bypassing the selector
    pub fn defer_close<R>(
        &self,
        value: R,
        handlers: impl Into<HandlerChain>,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        self.defer_forced(value, Strategy::Close, handlers.into())
    }

    /// Always release `value` with its error-aware close
    pub fn defer_close_with_error<R>(
        &self,
        value: R,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        self.defer_forced(value, Strategy::CloseWithError, HandlerChain::empty())
    }

    /// Release a lock guard when the scope ends
    pub fn defer_unlock<R>(
        &self,
        guard: R,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        self.defer_forced(guard, Strategy::Unlock, HandlerChain::empty())
    }

    /// [`Scope::must`] followed by [`Scope::defer_value`]
    pub fn must_defer<R, E>(
        &self,
        result: std::result::Result<R, E>,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
        E: Into<Error>,
    {
        self.must_defer_with(result, HandlerChain::empty())
    }

    /// [`Scope::must_with`] followed by [`Scope::defer_value_with`], sharing
    /// `handlers` between the acquisition and the release
    pub fn must_defer_with<R, E>(
        &self,
        result: std::result::Result<R, E>,
        handlers: impl Into<HandlerChain>,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
        E: Into<Error>,
    {
        let handlers: HandlerChain = handlers.into();
        let value = self.must_with(result, handlers.clone())?;
        self.defer_value_with(value, handlers)
    }

    /// Defer an arbitrary release function
    pub fn defer_func<F>(&self, release: F)
    where
        F: FnOnce(&State<'_>) -> Result<()> + 'env,
    {
        self.defer_func_with(release, HandlerChain::empty());
    }

    /// Like [`Scope::defer_func`]; release errors pass through `handlers`
    pub fn defer_func_with<F>(&self, release: F, handlers: impl Into<HandlerChain>)
    where
        F: FnOnce(&State<'_>) -> Result<()> + 'env,
    {
        debug!("deferred release function");
        self.stack
            .borrow_mut()
            .push(Entry::new("func", Box::new(release), handlers.into()));
    }

    fn defer_forced<R>(
        &self,
        value: R,
        strategy: Strategy,
        handlers: HandlerChain,
    ) -> std::result::Result<Deferred<'scope, R>, Exit<'scope>>
    where
        R: Resource + 'env,
    {
        let strategy = selector::check(strategy, std::any::type_name::<R>(), R::CAPABILITIES)
            .map_err(|err| Exit::new(Some(err)))?;
        Ok(self.push(value, strategy, handlers))
    }

    fn push<R>(&self, value: R, strategy: Strategy, handlers: HandlerChain) -> Deferred<'scope, R>
    where
        R: Resource + 'env,
    {
        let label = std::any::type_name::<R>();
        let slot = Rc::new(RefCell::new(Some(value)));
        let held = Rc::clone(&slot);
        let release = move |state: &State<'_>| {
            let value = held.borrow_mut().take();
            match value {
                Some(value) => strategy.release(value, state),
                None => Ok(()),
            }
        };

        debug!(resource = label, ?strategy, "deferred release");
        self.stack
            .borrow_mut()
            .push(Entry::new(label, Box::new(release), handlers));

        Deferred {
            slot,
            _scope: PhantomData,
        }
    }

    /// Drain the stack after the body finished and produce the scope's result.
    ///
    /// A panic from the body, or else the first panic from a release, is
    /// re-raised once every release has run.
    pub(crate) fn finish(&self, outcome: Outcome<'scope>) -> Result<()> {
        let (kind, mut terminal, body_panic) = match outcome {
            Ok(Ok(())) => (ExitKind::Completed, None, None),
            Ok(Err(exit)) => (ExitKind::Reported, exit.error, None),
            Err(payload) => (ExitKind::Panicked, None, Some(payload)),
        };
        let panic_cause = body_panic.as_deref().map(|payload| Error::panicked(payload));
        let panicking = body_panic.is_some();
        let settings = &self.settings;
        let mut stack = self.stack.take();

        trace!(?kind, pending = stack.len(), "unwinding scope");

        let mut release_panic: Option<Box<dyn Any + Send>> = None;
        while let Some(entry) = stack.pop() {
            let label = entry.label();
            let result = {
                let state = State::new(
                    Phase::Unwind,
                    terminal.as_ref().or(panic_cause.as_ref()),
                    panicking,
                );
                panic::catch_unwind(AssertUnwindSafe(move || entry.release(&state)))
            };

            match result {
                Ok(None) => trace!(resource = label, "released"),
                Ok(Some(err)) => {
                    warn!(resource = label, error = %err, "release failed");
                    let (kept, dropped) = settings.config.accumulation.combine(terminal.take(), err);
                    if let Some(dropped) = dropped {
                        if settings.config.log_discarded {
                            debug!(error = %dropped, kept = %kept, "dropped secondary error");
                        }
                    }
                    terminal = Some(kept);
                }
                Err(payload) => {
                    warn!(resource = label, "release panicked; continuing unwind");
                    release_panic.get_or_insert(payload);
                }
            }
        }

        if let Some(payload) = body_panic.or(release_panic) {
            if let Some(err) = &terminal {
                debug!(error = %err, "re-raising panic; terminal error is not returned");
            }
            panic::resume_unwind(payload);
        }

        match terminal {
            None => Ok(()),
            Some(err) => {
                let state = State::new(Phase::Exit, None, false);
                match settings.handlers.apply(&state, err) {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Debug for Scope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("pending", &self.len()).finish()
    }
}
