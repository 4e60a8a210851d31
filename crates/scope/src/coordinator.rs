//! Configured, reusable coordinators and the process-wide default

use crate::policy::Accumulation;
use crate::scope::{Exit, Scope};
use crate::selector::{Conservative, Selector};
use errscope_core::{Handler, HandlerChain, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Plain-data coordinator options, loadable from any serde format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// What to do with release errors once the scope already has an error
    pub accumulation: Accumulation,
    /// Log errors dropped by the accumulation policy at `debug`
    pub log_discarded: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            accumulation: Accumulation::FirstCause,
            log_discarded: true,
        }
    }
}

/// Immutable settings shared by every scope of one coordinator
pub(crate) struct Settings {
    pub(crate) handlers: HandlerChain,
    pub(crate) selector: Arc<dyn Selector>,
    pub(crate) config: CoordinatorConfig,
}

/// A configured scope runner.
///
/// Cloning is cheap and clones share configuration, so one coordinator can
/// serve many call sites and threads at once.
#[derive(Clone)]
pub struct Coordinator {
    settings: Arc<Settings>,
}

impl Coordinator {
    /// Coordinator with no default handlers, the conservative selector and
    /// first-cause accumulation
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Handlers applied once to the terminal error when a scope exits
    #[must_use]
    pub fn handlers(&self) -> &HandlerChain {
        &self.settings.handlers
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.settings.config
    }

    /// Run `body` in a fresh scope.
    ///
    /// Every deferred release runs in reverse registration order before
    /// this returns, whether the body completed, exited early, or panicked.
    /// A panic is re-raised after the releases; an early exit becomes the
    /// returned error after the default handlers are applied.
    ///
    /// ```
    /// use errscope::{Coordinator, Handler};
    ///
    /// let coordinator = Coordinator::builder()
    ///     .handler(Handler::context("loading settings"))
    ///     .build();
    ///
    /// let result = coordinator.run(|s| {
    ///     let raw: String = s.must(std::fs::read_to_string("/nonexistent/settings.toml"))?;
    ///     println!("{raw}");
    ///     Ok(())
    /// });
    ///
    /// assert!(result.unwrap_err().to_string().starts_with("loading settings"));
    /// ```
    pub fn run<'env, F>(&self, body: F) -> Result<()>
    where
        F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> std::result::Result<(), Exit<'scope>>,
    {
        let scope = Scope::new(Arc::clone(&self.settings));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&scope)));
        scope.finish(outcome)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("handlers", &self.settings.handlers)
            .field("config", &self.settings.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Coordinator`]
#[derive(Default)]
pub struct CoordinatorBuilder {
    handlers: Vec<Handler>,
    selector: Option<Arc<dyn Selector>>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    /// Append a default handler; defaults run after call-site handlers
    #[must_use]
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Replace the conservative selector
    #[must_use]
    pub fn selector(mut self, selector: impl Selector + 'static) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    #[must_use]
    pub fn accumulation(mut self, accumulation: Accumulation) -> Self {
        self.config.accumulation = accumulation;
        self
    }

    #[must_use]
    pub fn log_discarded(mut self, enabled: bool) -> Self {
        self.config.log_discarded = enabled;
        self
    }

    /// Take every plain-data option from `config`
    #[must_use]
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> Coordinator {
        Coordinator {
            settings: Arc::new(Settings {
                handlers: HandlerChain::new(self.handlers),
                selector: self.selector.unwrap_or_else(|| Arc::new(Conservative)),
                config: self.config,
            }),
        }
    }
}

static DEFAULT_COORDINATOR: Lazy<Coordinator> = Lazy::new(Coordinator::new);

/// The shared coordinator used by [`run`]
#[must_use]
pub fn default_coordinator() -> &'static Coordinator {
    &DEFAULT_COORDINATOR
}

/// Run `body` with the default coordinator
pub fn run<'env, F>(body: F) -> Result<()>
where
    F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> std::result::Result<(), Exit<'scope>>,
{
    DEFAULT_COORDINATOR.run(body)
}
