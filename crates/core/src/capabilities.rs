//! Release capabilities a resource can declare to the defer stack

use crate::errors::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// The set of release actions a resource supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Plain, no-argument release returning an optional error.
        const CLOSE            = 0b0001;
        /// Release that is told the error that caused the scope to fail.
        const CLOSE_WITH_ERROR = 0b0010;
        /// Release of a mutual-exclusion hold; cannot fail.
        const UNLOCK           = 0b0100;
    }
}

impl Capabilities {
    /// Names of the declared capabilities, for diagnostics
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// A value whose lifetime inside a scope ends with a release action.
///
/// Implementors declare what they support through [`Resource::CAPABILITIES`]
/// and override the matching methods. The defaults report
/// [`Error::Unsupported`], so a mismatched declaration surfaces as an error
/// at unwind time instead of a silent no-op.
///
/// ```
/// use errscope_core::{Capabilities, Error, Resource, Result};
///
/// struct Upload { committed: bool }
///
/// impl Resource for Upload {
///     const CAPABILITIES: Capabilities =
///         Capabilities::CLOSE.union(Capabilities::CLOSE_WITH_ERROR);
///
///     fn close(mut self) -> Result<()> {
///         self.committed = true;
///         Ok(())
///     }
///
///     fn close_with_error(self, cause: Option<&Error>) -> Result<()> {
///         match cause {
///             None => self.close(),
///             Some(_) => Ok(()), // abandon the partial upload
///         }
///     }
/// }
/// ```
pub trait Resource {
    /// Release actions this type implements
    const CAPABILITIES: Capabilities;

    /// Plain release
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Err(Error::unsupported(
            std::any::type_name::<Self>(),
            "close",
        ))
    }

    /// Error-aware release; `cause` is `None` when the scope is not failing
    fn close_with_error(self, cause: Option<&Error>) -> Result<()>
    where
        Self: Sized,
    {
        let _ = cause;
        Err(Error::unsupported(
            std::any::type_name::<Self>(),
            "close_with_error",
        ))
    }

    /// Release a lock; the default simply drops the value
    fn unlock(self)
    where
        Self: Sized,
    {
    }
}
