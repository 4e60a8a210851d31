//! Core types for the `errscope` coordinator.
//!
//! This crate holds everything a scope needs that is independent of how a
//! scope runs: the error model, the handler chain used to decorate errors,
//! the state snapshot handlers observe, and the capability contract that
//! resources implement.
//!
//! ## Key Components
//!
//! - **`errors`**: The `Error` enum and `Result` alias, plus `ResultExt`
//!   for adding context.
//! - **`handler`**: `Handler` steps and the immutable `HandlerChain`.
//! - **`state`**: The read-only `State` snapshot passed to handlers and
//!   release actions.
//! - **`capabilities`**: The `Capabilities` flag set and the `Resource`
//!   trait.
//! - **`resources`**: `Resource` impls for files, sockets, child processes
//!   and mutex guards.

pub mod capabilities;
pub mod errors;
pub mod handler;
mod resources;
pub mod state;

pub use self::{
    capabilities::{Capabilities, Resource},
    errors::{BoxError, Error, Result, ResultExt},
    handler::{Decorate, Handler, HandlerChain},
    state::{Phase, State},
};
