#![allow(dead_code)]
//! Shared fixtures: resources that record how they were released

use errscope::{Capabilities, Error, Resource, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered record of release events
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

fn outcome(name: &str, fail: bool) -> Result<()> {
    if fail {
        Err(Error::failure(format!("release {name} failed")))
    } else {
        Ok(())
    }
}

/// Supports only the plain close
pub struct Plain {
    pub name: &'static str,
    pub log: Log,
    pub fail: bool,
}

impl Plain {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(name: &'static str, log: &Log) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }
}

impl Resource for Plain {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE;

    fn close(self) -> Result<()> {
        self.log.push(format!("close {}", self.name));
        outcome(self.name, self.fail)
    }
}

/// Supports only the error-aware close
pub struct Aware {
    pub name: &'static str,
    pub log: Log,
}

impl Aware {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }
}

impl Resource for Aware {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE_WITH_ERROR;

    fn close_with_error(self, cause: Option<&Error>) -> Result<()> {
        match cause {
            Some(cause) => self.log.push(format!("abort {}: {cause}", self.name)),
            None => self.log.push(format!("close {}", self.name)),
        }
        Ok(())
    }
}

/// Supports both closes
pub struct Dual {
    pub name: &'static str,
    pub log: Log,
    pub fail: bool,
}

impl Dual {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(name: &'static str, log: &Log) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }
}

impl Resource for Dual {
    const CAPABILITIES: Capabilities = Capabilities::CLOSE.union(Capabilities::CLOSE_WITH_ERROR);

    fn close(self) -> Result<()> {
        self.log.push(format!("close {}", self.name));
        outcome(self.name, self.fail)
    }

    fn close_with_error(self, cause: Option<&Error>) -> Result<()> {
        match cause {
            Some(cause) => self.log.push(format!("abort {}: {cause}", self.name)),
            None => self.log.push(format!("close-with-nil {}", self.name)),
        }
        outcome(self.name, self.fail)
    }
}

/// Declares no release action at all
pub struct Opaque;

impl Resource for Opaque {
    const CAPABILITIES: Capabilities = Capabilities::empty();
}

/// Route scope logs to the test harness; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::new("errscope=trace"))
        .try_init();
}
