//! Per-target evaluation context.
//!
//! A context joins one tree and one session: it holds the query target,
//! the assignments and import tables, the binding table (built-ins plus
//! session extensions) and the `print` output buffer. Compilation is
//! delegated to the session so identical selector text is shared across
//! contexts; the side-effect records on a compiled selector (`let`,
//! `import`) are re-applied here, idempotently, on every evaluation.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};

use crate::error::{Error, EvalError};
use crate::model;
use crate::path::{evaluate, Bindings, CompiledPath, EvalScope, VarSource};
use crate::selector::{Compiled, ImportRequest};
use crate::session::Session;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

pub(crate) mod bindings;
pub mod imports;

pub use imports::{ImportCell, ImportLoader};

lazy_static! {
    // interpolation names stop at `-` so `$prefix-port` splices `$prefix`
    static ref INTERPOLATION: Regex = Regex::new(r"\$([A-Za-z_]\w*)").unwrap();
}

/// The outcome of [`Context::evaluate`]: either a value, or a deferred
/// evaluation that [`Context::settle`] completes once its requested
/// imports resolve.
#[derive(Clone)]
pub enum Evaluation {
    Ready(Value),
    Pending {
        compiled: Arc<Compiled>,
        import_names: Vec<String>,
    },
}

/// Evaluation state for one query target.
pub struct Context<'a> {
    tree: &'a Tree,
    session: &'a Session,
    target: Value,
    assignments: IndexMap<String, Value>,
    imports: IndexMap<String, Arc<ImportCell>>,
    bindings: Bindings,
    output: RefCell<String>,
}

impl<'a> Context<'a> {
    pub fn new(tree: &'a Tree, session: &'a Session) -> Context<'a> {
        let mut bindings = bindings::builtins();
        for (name, binding) in session.extensions() {
            bindings.register(name, binding.clone());
        }
        Context {
            tree,
            session,
            target: Value::Node(tree.root()),
            assignments: IndexMap::new(),
            imports: IndexMap::new(),
            bindings,
            output: RefCell::new(String::new()),
        }
    }

    /// Pin the query target to a node other than the document root.
    pub fn pin_model(&mut self, node: NodeId) {
        self.target = Value::Node(node);
    }

    pub fn target(&self) -> &Value {
        &self.target
    }

    pub fn assignments(&self) -> &IndexMap<String, Value> {
        &self.assignments
    }

    /// The import cell recorded under a normalized name, if any.
    pub fn imported(&self, name: &str) -> Option<&Arc<ImportCell>> {
        self.imports.get(name)
    }

    /// Drain the accumulated `print` output.
    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    /// Store an assignment. Both the value and the key are normalized:
    /// JSON literal first, then selector evaluation against the current
    /// state, then `$name` interpolation. Later assignments may reference
    /// earlier ones in either position.
    pub fn assign(&mut self, key: &str, value: &str) {
        let value = self.normalize(value);
        let key = model::display_value(self.tree, &self.normalize(key));
        self.assignments.insert(key, value);
    }

    /// Request an import under a normalized name. The session deduplicates
    /// the load; this context records the cell so `$name` resolves to the
    /// imported value once it lands.
    pub fn import(&mut self, name: &str) -> Arc<ImportCell> {
        let normalized = model::display_value(self.tree, &self.normalize(name));
        self.import_named(&normalized)
    }

    fn import_named(&mut self, name: &str) -> Arc<ImportCell> {
        let cell = self.session.import_cell(name);
        self.imports.insert(name.to_string(), cell.clone());
        cell
    }

    /// Compile and run selector text against the target. Side-effect
    /// records re-apply first; a compilation that requested imports
    /// returns [`Evaluation::Pending`] even when every load has already
    /// settled.
    pub fn evaluate(&mut self, text: &str) -> Result<Evaluation, Error> {
        let compiled = self.session.compile(text)?;
        for (name, raw) in &compiled.variables_declared {
            self.assign(name, raw);
        }
        let mut import_names = Vec::new();
        for request in &compiled.imports_requested {
            let cell = match request {
                ImportRequest::Literal(name) => self.import_named(name),
                ImportRequest::Expression(expr) => self.import(expr),
            };
            import_names.push(cell.name().to_string());
        }
        // Requested imports always defer, settled or not; the outcome must
        // not depend on loader timing.
        if !import_names.is_empty() {
            debug!("evaluation pending on {} import(s)", import_names.len());
            return Ok(Evaluation::Pending {
                compiled,
                import_names,
            });
        }
        let value = self.run(&compiled.path)?;
        Ok(Evaluation::Ready(value))
    }

    /// Block until a pending evaluation's imports settle, then produce its
    /// value: the first non-empty resolved import in request order wins,
    /// otherwise the expression result.
    pub fn settle(&mut self, evaluation: Evaluation) -> Result<Value, Error> {
        match evaluation {
            Evaluation::Ready(value) => Ok(value),
            Evaluation::Pending {
                compiled,
                import_names,
            } => {
                for name in &import_names {
                    if let Some(cell) = self.imports.get(name) {
                        let _ = cell.wait();
                    }
                }
                for name in &import_names {
                    let resolved = self.imports.get(name).and_then(|cell| cell.value());
                    if let Some(value) = resolved {
                        if !value.is_empty_result() {
                            return Ok(value);
                        }
                    }
                }
                Ok(self.run(&compiled.path)?)
            }
        }
    }

    /// Evaluate-then-settle.
    pub fn query(&mut self, text: &str) -> Result<Value, Error> {
        let evaluation = self.evaluate(text)?;
        self.settle(evaluation)
    }

    fn run(&self, path: &CompiledPath) -> Result<Value, EvalError> {
        let vars = ContextVars {
            assignments: &self.assignments,
            imports: &self.imports,
        };
        let scope = EvalScope {
            tree: self.tree,
            focus: &self.target,
            vars: &vars,
            bindings: &self.bindings,
            output: &self.output,
        };
        evaluate(path, &scope)
    }

    /// Normalize raw assignment/import text: JSON literal, then selector
    /// evaluation (kept when it produces a value), then interpolation.
    fn normalize(&self, text: &str) -> Value {
        let trimmed = text.trim();
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return Value::from_json(json);
        }
        if let Ok(compiled) = self.session.compile(trimmed) {
            if let Ok(value) = self.run(&compiled.path) {
                if !matches!(value, Value::Null) {
                    return value;
                }
            }
        }
        Value::Str(self.interpolate(trimmed))
    }

    fn interpolate(&self, text: &str) -> String {
        INTERPOLATION
            .replace_all(text, |caps: &Captures| {
                match self.assignments.get(&caps[1]) {
                    Some(value) => model::display_value(self.tree, value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

struct ContextVars<'a> {
    assignments: &'a IndexMap<String, Value>,
    imports: &'a IndexMap<String, Arc<ImportCell>>,
}

impl VarSource for ContextVars<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.assignments.get(name) {
            return Some(value.clone());
        }
        self.imports.get(name).and_then(|cell| cell.value())
    }
}
