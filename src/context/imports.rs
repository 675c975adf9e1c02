//! Import cells and the loader seam.
//!
//! Each distinct normalized import name gets one shared cell per session;
//! concurrent queries naming the same import share the single in-flight
//! load. A failed load settles the cell but reads as absent through
//! `value()`, so one broken import cannot abort an otherwise-successful
//! query. `raw()` still exposes the failure to callers that look.

use crate::error::ImportError;
use crate::sync::Deferred;
use crate::value::Value;

/// Resolves import targets by name. Loads run on spawned threads and may
/// block.
pub trait ImportLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Value, ImportError>;
}

impl<F> ImportLoader for F
where
    F: Fn(&str) -> Result<Value, ImportError> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Value, ImportError> {
        self(name)
    }
}

/// The default loader; it knows no names.
pub struct NoLoader;

impl ImportLoader for NoLoader {
    fn load(&self, name: &str) -> Result<Value, ImportError> {
        Err(ImportError::new(name, "no import loader registered"))
    }
}

/// One import's shared settlement state.
pub struct ImportCell {
    name: String,
    state: Deferred<Result<Value, ImportError>>,
}

impl ImportCell {
    pub(crate) fn new(name: &str) -> ImportCell {
        ImportCell {
            name: name.to_string(),
            state: Deferred::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settle the cell; the first outcome wins.
    pub(crate) fn settle(&self, outcome: Result<Value, ImportError>) -> bool {
        self.state.resolve(outcome)
    }

    /// The resolved value. Unsettled and failed imports both read absent.
    pub fn value(&self) -> Option<Value> {
        self.state.peek().and_then(|outcome| outcome.ok())
    }

    /// The settled outcome, load failure included.
    pub fn raw(&self) -> Option<Result<Value, ImportError>> {
        self.state.peek()
    }

    /// Block until the load settles; a failed load yields `None`.
    pub fn wait(&self) -> Option<Value> {
        self.state.wait().ok()
    }

    pub fn is_settled(&self) -> bool {
        self.state.peek().is_some()
    }
}
