//! Scoped error handling with ordered, failure-aware resource release.
//!
//! A [`Coordinator`] runs a body inside a [`Scope`]. The body reports
//! failures with [`Scope::must`], which ends the body early, and registers
//! acquired resources with [`Scope::defer_value`] and friends. When the
//! body ends, for any reason, the scope releases every registered value in
//! reverse order. Values that support an error-aware release are aborted
//! instead of closed when the scope is failing.
//!
//! ```
//! use errscope::{Handler, Resource, Capabilities, Error, Result};
//!
//! struct Writer { name: &'static str }
//!
//! impl Resource for Writer {
//!     const CAPABILITIES: Capabilities =
//!         Capabilities::CLOSE.union(Capabilities::CLOSE_WITH_ERROR);
//!
//!     fn close(self) -> Result<()> {
//!         println!("commit {}", self.name);
//!         Ok(())
//!     }
//!
//!     fn close_with_error(self, cause: Option<&Error>) -> Result<()> {
//!         println!("abort {} because of {cause:?}", self.name);
//!         Ok(())
//!     }
//! }
//!
//! let result = errscope::run(|s| {
//!     let _out = s.defer_value(Writer { name: "out" })?;
//!     s.must_with(Err::<(), _>(Error::failure("disk full")), Handler::context("copying"))?;
//!     Ok(())
//! });
//!
//! assert_eq!(result.unwrap_err().to_string(), "copying: disk full");
//! ```
//!
//! ## Key Components
//!
//! - **`scope`**: `Scope`, the early-exit `Exit` signal and `Deferred`
//!   handles.
//! - **`selector`**: Maps declared capabilities to a release `Strategy`.
//! - **`policy`**: `Accumulation` of release errors during unwind.
//! - **`coordinator`**: `Coordinator`, its builder and config, and the
//!   process-wide default used by [`run`].

pub mod coordinator;
pub mod policy;
pub mod scope;
pub mod selector;
mod stack;

pub use self::{
    coordinator::{default_coordinator, run, Coordinator, CoordinatorBuilder, CoordinatorConfig},
    policy::Accumulation,
    scope::{Deferred, Exit, Scope},
    selector::{Action, Conservative, PlainFirst, Selector, Strategy},
};
pub use errscope_core::{
    BoxError, Capabilities, Decorate, Error, Handler, HandlerChain, Phase, Resource, Result,
    ResultExt, State,
};
