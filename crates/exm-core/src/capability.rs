//! Lazy capability tables
//!
//! Hosts and extensions expose functionality to each other as named
//! capabilities. A declaring party lists the names up front; each value is
//! materialized by a resolver on first read only, and a successful
//! resolution is cached for the lifetime of the table.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A capability value. Consumers downcast to the concrete type they expect.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// Resolver invoked at most once per successfully-read name.
pub type Resolver<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

/// A lazily-resolved name → value mapping.
///
/// `get` on an undeclared name is `None` without touching the resolver.
/// A resolver returning `None` is retried on the next read; once it returns
/// a value, that value is cached and the resolver is never consulted for
/// that name again.
pub struct LazyMap<T> {
    declared: Vec<String>,
    resolver: Resolver<T>,
    cache: Mutex<HashMap<String, T>>,
}

/// Capability table exchanged between host and extension.
pub type CapabilityTable = LazyMap<Capability>;

impl<T: Clone> LazyMap<T> {
    /// A table with no declarations; every read is `None`.
    pub fn empty() -> Self {
        Self::bind(Vec::new(), Box::new(|_| None))
    }

    /// Install lazy accessors for each declared name, backed by `resolver`.
    pub fn bind(declarations: impl IntoIterator<Item = String>, resolver: Resolver<T>) -> Self {
        Self {
            declared: declarations.into_iter().collect(),
            resolver,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read a capability, resolving it on first access.
    pub fn get(&self, name: &str) -> Option<T> {
        if !self.declared.iter().any(|n| n == name) {
            return None;
        }

        let mut cache = self.cache.lock().expect("capability cache poisoned");
        if let Some(value) = cache.get(name) {
            return Some(value.clone());
        }
        // Resolved under the lock so the side effect happens at most once
        // even with concurrent readers.
        let value = (self.resolver)(name)?;
        cache.insert(name.to_string(), value.clone());
        Some(value)
    }

    /// Declared capability names, in declaration order.
    pub fn names(&self) -> &[String] {
        &self.declared
    }

    /// Whether a name has already been resolved and cached.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.cache
            .lock()
            .expect("capability cache poisoned")
            .contains_key(name)
    }
}

impl<T> std::fmt::Debug for LazyMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyMap")
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}
