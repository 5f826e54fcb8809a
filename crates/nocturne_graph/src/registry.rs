// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of module constructors keyed by type name.

use crate::module::PatchModule;
use crate::patch::PatchError;
use indexmap::IndexMap;

/// Zero-argument module constructor
pub type ModuleConstructor = Box<dyn Fn() -> Box<dyn PatchModule>>;

/// Registry of available module types
pub struct ModuleRegistry {
    /// Registered constructors by type name
    factories: IndexMap<String, ModuleConstructor>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Register a module type
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn PatchModule> + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(constructor));
    }

    /// Whether a type name is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Instantiate a module by type name
    pub fn create(&self, type_name: &str) -> Result<Box<dyn PatchModule>, PatchError> {
        self.factories
            .get(type_name)
            .map(|constructor| constructor())
            .ok_or_else(|| PatchError::ModuleTypeNotFound(type_name.to_string()))
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
