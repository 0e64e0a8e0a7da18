//! Plugin registry.
//!
//! [`PluginRegistry`] is an immutable snapshot built once at startup.
//! [`SharedRegistry`] holds the current snapshot; reloading swaps in a whole
//! new registry and never mutates a published one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::{EvalError, Result};
use crate::plugin::{Check, EvaluatorPlugin, PluginInfo};

/// Immutable catalog of evaluator plugins, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn EvaluatorPlugin>>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// Exact-match lookup by plugin identifier.
    pub fn resolve(&self, plugin_id: &str) -> Result<Arc<dyn EvaluatorPlugin>> {
        self.index
            .get(plugin_id)
            .map(|&i| Arc::clone(&self.plugins[i]))
            .ok_or_else(|| EvalError::PluginNotFound(plugin_id.to_string()))
    }

    /// Resolve a plugin function to its check.
    pub fn resolve_function(&self, plugin_id: &str, function: &str) -> Result<Arc<dyn Check>> {
        self.resolve(plugin_id)?
            .function(function)
            .ok_or_else(|| EvalError::FunctionNotFound {
                plugin: plugin_id.to_string(),
                function: function.to_string(),
            })
    }

    pub fn list_all(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| p.describe()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.identifier()))
            .finish()
    }
}

/// Collects plugins; identifiers must be unique.
#[derive(Default)]
pub struct PluginRegistryBuilder {
    registry: PluginRegistry,
}

impl PluginRegistryBuilder {
    pub fn register(mut self, plugin: Arc<dyn EvaluatorPlugin>) -> Result<Self> {
        let id = plugin.identifier().to_string();
        if self.registry.index.contains_key(&id) {
            return Err(EvalError::DuplicatePlugin(id));
        }
        self.registry
            .index
            .insert(id, self.registry.plugins.len());
        self.registry.plugins.push(plugin);
        Ok(self)
    }

    pub fn build(self) -> PluginRegistry {
        info!(plugins = self.registry.len(), "plugin registry built");
        self.registry
    }
}

/// Process-wide handle to the current registry snapshot.
#[derive(Debug)]
pub struct SharedRegistry {
    current: RwLock<Arc<PluginRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry as of now. Later swaps do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<PluginRegistry> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Publish a new registry, returning the previous one.
    pub fn swap(&self, registry: PluginRegistry) -> Arc<PluginRegistry> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        info!(plugins = registry.len(), "plugin registry swapped");
        std::mem::replace(&mut *guard, Arc::new(registry))
    }
}

impl From<PluginRegistry> for SharedRegistry {
    fn from(registry: PluginRegistry) -> Self {
        SharedRegistry::new(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{CheckInput, FunctionTable, StaticPlugin};
    use dmp_eval_state::{Evaluation, Verdict};

    fn pass(input: CheckInput<'_>) -> Evaluation {
        input.evaluation(Verdict::Pass)
    }

    fn plugin(id: &str) -> Arc<dyn EvaluatorPlugin> {
        Arc::new(StaticPlugin::new(
            id,
            format!("{id} checks"),
            FunctionTable::new().with_fn("pass", pass),
        ))
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::builder()
            .register(plugin("A"))
            .unwrap()
            .register(plugin("B"))
            .unwrap()
            .build()
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let err = PluginRegistry::builder()
            .register(plugin("A"))
            .unwrap()
            .register(plugin("A"))
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::DuplicatePlugin(ref id) if id == "A"));
    }

    #[test]
    fn resolve_is_exact_match() {
        let reg = registry();
        assert_eq!(reg.resolve("A").unwrap().identifier(), "A");
        assert!(matches!(reg.resolve("a"), Err(EvalError::PluginNotFound(_))));
    }

    #[test]
    fn resolve_function_distinguishes_plugin_and_function_misses() {
        let reg = registry();
        assert!(matches!(
            reg.resolve_function("Z", "pass"),
            Err(EvalError::PluginNotFound(ref id)) if id == "Z"
        ));
        assert!(matches!(
            reg.resolve_function("A", "nope"),
            Err(EvalError::FunctionNotFound { ref plugin, ref function }) if plugin == "A" && function == "nope"
        ));
    }

    #[test]
    fn repeated_resolution_yields_the_same_check() {
        let reg = registry();
        let first = reg.resolve_function("B", "pass").unwrap();
        let second = reg.resolve_function("B", "pass").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn list_all_keeps_registration_order() {
        let ids: Vec<String> = registry()
            .list_all()
            .into_iter()
            .map(|p| p.plugin_id)
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn swap_does_not_disturb_existing_snapshots() {
        let shared = SharedRegistry::new(registry());
        let before = shared.snapshot();

        let replacement = PluginRegistry::builder()
            .register(plugin("C"))
            .unwrap()
            .build();
        let previous = shared.swap(replacement);

        assert_eq!(before.len(), 2);
        assert!(Arc::ptr_eq(&before, &previous));
        assert!(shared.snapshot().resolve("C").is_ok());
        assert!(shared.snapshot().resolve("A").is_err());
        assert!(before.resolve("A").is_ok());
    }
}
