//! Error types and result extensions for errscope operations

mod builders;
mod conversions;
mod extensions;
mod types;

pub use extensions::*;
pub use types::{BoxError, Error, Result};
