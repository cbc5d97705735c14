//! Named callables, built once and shared read-only.

use std::sync::Arc;

use hashbrown::HashMap;

use super::{AssignCallable, CallableRef, binary_search, dispatch, field_access, string_functions};
use crate::errors::{Error, Result};

#[derive(Debug, Default)]
pub struct Registry {
    callables: HashMap<String, CallableRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin callables: `assign`, `binary_search`, `field_access`, `mod`
    /// and `utf8_len`.
    pub fn with_defaults() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry.register(Arc::new(AssignCallable::new()));
        registry.register(binary_search::binary_search());
        registry.register(field_access::field_access());
        registry.register(dispatch::mod_callable());
        registry.register(string_functions::utf8_len());
        Arc::new(registry)
    }

    /// Adds `callable` under its name, returning the one it replaces.
    pub fn register(&mut self, callable: CallableRef) -> Option<CallableRef> {
        self.callables.insert(callable.name().to_string(), callable)
    }

    pub fn get(&self, name: &str) -> Result<CallableRef> {
        self.callables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Type(format!("no callable named {name:?}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
