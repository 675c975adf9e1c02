//! Shared query session state.
//!
//! A session owns everything contexts share: the compiled-selector cache,
//! caller-registered transforms and extension bindings, and the import
//! loader with its per-name cell registry. Registration happens before the
//! session is shared; compilation and import lookup are safe from any
//! thread.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use log::{debug, warn};
use lru::LruCache;

use crate::context::imports::{ImportCell, ImportLoader, NoLoader};
use crate::error::CompileError;
use crate::path::BindingFn;
use crate::selector::{self, Compiled, Transform};
use crate::value::Value;

const CACHE_CAPACITY: usize = 256;

pub struct Session {
    cache: Mutex<LruCache<String, Arc<Compiled>>>,
    transforms: Vec<Transform>,
    bindings: Vec<(String, BindingFn)>,
    loader: Arc<dyn ImportLoader>,
    imports: Mutex<HashMap<String, Arc<ImportCell>>>,
}

impl Session {
    pub fn new() -> Session {
        Session::with_loader(Arc::new(NoLoader))
    }

    pub fn with_loader(loader: Arc<dyn ImportLoader>) -> Session {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Session {
            cache: Mutex::new(LruCache::new(capacity)),
            transforms: Vec::new(),
            bindings: Vec::new(),
            loader,
            imports: Mutex::new(HashMap::new()),
        }
    }

    /// Register a selector rewrite applied after the built-in phases.
    /// Registration invalidates previously cached compilations.
    pub fn register_transform(
        &mut self,
        pattern: &str,
        replacement: &str,
    ) -> std::result::Result<(), CompileError> {
        let transform = Transform::new(pattern, replacement)?;
        self.transforms.push(transform);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Register an extension binding picked up by every new context.
    pub fn register_binding(&mut self, name: &str, binding: BindingFn) {
        self.bindings.push((name.to_string(), binding));
    }

    pub(crate) fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub(crate) fn extensions(&self) -> &[(String, BindingFn)] {
        &self.bindings
    }

    /// Compile selector text, reusing the cached result for identical input.
    pub fn compile(&self, text: &str) -> std::result::Result<Arc<Compiled>, CompileError> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(text) {
                debug!("selector cache hit: {:?}", text);
                return Ok(hit.clone());
            }
        }
        // compile outside the lock; a racing duplicate is deterministic
        let compiled = Arc::new(selector::compile(text, &self.transforms)?);
        debug!("selector compiled: {:?} -> {:?}", text, compiled.source);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(text.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// The shared cell for a normalized import name, starting the load on a
    /// new thread the first time the name is seen.
    pub fn import_cell(&self, name: &str) -> Arc<ImportCell> {
        let cell = {
            let mut imports = self.imports.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = imports.get(name) {
                return cell.clone();
            }
            let cell = Arc::new(ImportCell::new(name));
            imports.insert(name.to_string(), cell.clone());
            cell
        };
        let loader = self.loader.clone();
        let task = cell.clone();
        thread::spawn(move || {
            let outcome = loader.load(task.name());
            if let Err(error) = &outcome {
                warn!("{}", error);
            }
            task.settle(outcome);
            debug!("import `{}` settled", task.name());
        });
        cell
    }

    /// Resolved import values by name, for callers inspecting the table.
    pub fn resolved_imports(&self) -> Vec<(String, Option<Value>)> {
        let imports = self.imports.lock().unwrap_or_else(PoisonError::into_inner);
        imports
            .iter()
            .map(|(name, cell)| (name.clone(), cell.value()))
            .collect()
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}
