//! Capability registries: composite key to component descriptor.
//!
//! Registry entries are plain data rather than constructor closures, so
//! they can be inspected, serialized, and asserted on in tests. Turning an
//! entry into something runnable is a stateless materialization step on
//! the client factory; nothing is spawned while a descriptor sits in a
//! registry.

use kiln_core::{ComponentClass, ComponentKey, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One registered capability: which binary to run and which component of
/// it to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Resolved absolute path of the plugin binary.
    pub plugin_path: PathBuf,
    /// Capability class the component belongs to.
    pub class: ComponentClass,
    /// Component name as the plugin declared it.
    pub component: String,
}

impl ComponentDescriptor {
    /// Arguments that start this component over RPC:
    /// `start <class> <component>`.
    #[must_use]
    pub fn start_args(&self) -> Vec<String> {
        vec![
            "start".to_string(),
            self.class.as_str().to_string(),
            self.component.clone(),
        ]
    }
}

/// One of the four capability namespaces.
///
/// Within a discovery pass, later insertions under the same key overwrite
/// earlier ones: priority is strictly scan order, never a version
/// comparison.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    class: ComponentClass,
    entries: HashMap<ComponentKey, ComponentDescriptor>,
}

impl ComponentRegistry {
    /// Creates an empty registry for `class`.
    #[must_use]
    pub fn new(class: ComponentClass) -> Self {
        Self {
            class,
            entries: HashMap::new(),
        }
    }

    /// The class this registry holds.
    #[must_use]
    pub const fn class(&self) -> ComponentClass {
        self.class
    }

    /// Inserts a descriptor, overwriting any earlier entry for the key.
    pub fn insert(&mut self, key: ComponentKey, descriptor: ComponentDescriptor) {
        if let Some(previous) = self.entries.insert(key.clone(), descriptor) {
            tracing::debug!(
                class = %self.class,
                key = %key,
                previous = %previous.plugin_path.display(),
                "later-discovered plugin overrides earlier entry"
            );
        }
    }

    /// Looks up a descriptor by composite key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ComponentNotFound`] naming this registry's class.
    pub fn get(&self, key: &str) -> Result<&ComponentDescriptor> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::ComponentNotFound {
                class: self.class,
                key: key.to_string(),
            })
    }

    /// `true` when the key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(ComponentKey::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentKey, &ComponentDescriptor)> {
        self.entries.iter()
    }
}
