//! Filter registry
//!
//! Filters are pure functions of the piped value and an optional parameter
//! (`Value::Nil` when none is given).

mod builtin;

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type FilterFn = Arc<dyn Fn(&Value, &Value) -> Result<Value> + Send + Sync>;

/// Name → filter lookup, read-only once the engine is built
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in filter library
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, filter) in builtin::BUILTINS {
            registry.filters.insert(name.to_string(), Arc::new(*filter));
        }
        registry
    }

    /// Register a filter; names can only be registered once
    pub fn register(&mut self, name: &str, filter: FilterFn) -> Result<()> {
        if self.filters.contains_key(name) {
            return Err(Error::registry(format!(
                "Filter with name '{}' is already registered",
                name
            )));
        }
        log::debug!("Registered filter '{}'", name);
        self.filters.insert(name.to_string(), filter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Apply filter `name` directly
    pub fn apply(&self, name: &str, input: &Value, param: &Value) -> Result<Value> {
        let filter = self
            .get(name)
            .ok_or_else(|| Error::registry(format!("Filter '{}' does not exist", name)))?;
        filter(input, param)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.len())
            .finish()
    }
}
