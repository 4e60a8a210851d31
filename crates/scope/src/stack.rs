//! The per-scope stack of pending releases

use errscope_core::{Error, HandlerChain, Result, State};

pub(crate) type ReleaseFn<'env> = Box<dyn FnOnce(&State<'_>) -> Result<()> + 'env>;

/// One pending release
pub(crate) struct Entry<'env> {
    label: &'static str,
    release: ReleaseFn<'env>,
    handlers: HandlerChain,
}

impl<'env> Entry<'env> {
    pub(crate) fn new(label: &'static str, release: ReleaseFn<'env>, handlers: HandlerChain) -> Self {
        Self {
            label,
            release,
            handlers,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        self.label
    }

    /// Run the release; a failure is passed through this entry's handlers
    pub(crate) fn release(self, state: &State<'_>) -> Option<Error> {
        match (self.release)(state) {
            Ok(()) => None,
            Err(err) => self.handlers.apply(state, err),
        }
    }
}

/// LIFO collection of entries, owned by exactly one scope
#[derive(Default)]
pub(crate) struct DeferStack<'env> {
    entries: Vec<Entry<'env>>,
}

impl<'env> DeferStack<'env> {
    pub(crate) fn push(&mut self, entry: Entry<'env>) {
        self.entries.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<Entry<'env>> {
        self.entries.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
