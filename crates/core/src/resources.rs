//! `Resource` implementations for common std and parking_lot types

use crate::capabilities::{Capabilities, Resource};
use crate::errors::{Error, Result};
use std::fs::File;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::process::Child;

/// Closing flushes file contents and metadata to disk, surfacing errors
/// that dropping the file would swallow
impl Resource for File {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE;

    fn close(self) -> Result<()> {
        self.sync_all().map_err(|e| Error::io("sync file", e))
    }
}

impl Resource for TcpStream {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE;

    fn close(self) -> Result<()> {
        match self.shutdown(Shutdown::Both) {
            // The peer already went away
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(|e| Error::io("shut down tcp stream", e)),
        }
    }
}

/// A child process is waited for on success and killed on failure
impl Resource for Child {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE.union(Capabilities::CLOSE_WITH_ERROR);

    fn close(mut self) -> Result<()> {
        let status = self
            .wait()
            .map_err(|e| Error::io("wait for child process", e))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::failure(format!(
                "child process {} exited with {status}",
                self.id()
            )))
        }
    }

    fn close_with_error(mut self, cause: Option<&Error>) -> Result<()> {
        let Some(cause) = cause else {
            return self.close();
        };
        tracing::debug!(pid = self.id(), %cause, "killing child process");
        match self.kill() {
            // Already exited; reaping below still applies
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            other => other.map_err(|e| Error::io("kill child process", e))?,
        }
        self.wait()
            .map(drop)
            .map_err(|e| Error::io("wait for child process", e))
    }
}

impl<T: ?Sized> Resource for std::sync::MutexGuard<'_, T> {
    const CAPABILITIES: Capabilities = Capabilities::UNLOCK;
}

impl<T: ?Sized> Resource for parking_lot::MutexGuard<'_, T> {
    const CAPABILITIES: Capabilities = Capabilities::UNLOCK;
}
