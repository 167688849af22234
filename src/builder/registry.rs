//! Builder id → adapter and capabilities, resolved once at startup.

use std::sync::Arc;

use thiserror::Error;

use super::{Beaver, Breakdance, Bricks, BuilderAdapter, Elementor, Gutenberg, LiveCanvas, Oxygen};

/// Features an integration switches on for its editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Publish a build request whenever the editor saves.
    SaveDetector,
    /// Keep the editor's design-token stylesheet current.
    VariableSync,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown builder `{0}`")]
    Unknown(String),
}

#[derive(Clone)]
pub struct Integration {
    pub id: &'static str,
    pub adapter: Arc<dyn BuilderAdapter>,
    /// In activation order.
    pub capabilities: &'static [Capability],
}

impl Integration {
    fn new(adapter: impl BuilderAdapter + 'static, capabilities: &'static [Capability]) -> Self {
        Self {
            id: adapter.id(),
            adapter: Arc::new(adapter),
            capabilities,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

const ALL: &[Capability] = &[Capability::SaveDetector, Capability::VariableSync];

pub struct Registry {
    integrations: Vec<Integration>,
}

impl Registry {
    /// Every editor shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            integrations: vec![
                Integration::new(Bricks, ALL),
                Integration::new(Breakdance, ALL),
                Integration::new(Oxygen, ALL),
                Integration::new(Elementor, ALL),
                Integration::new(Gutenberg, ALL),
                Integration::new(Beaver, &[Capability::SaveDetector]),
                Integration::new(LiveCanvas, &[Capability::SaveDetector]),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.integrations.iter().map(|i| i.id)
    }

    /// Resolve enabled ids. Empty means all.
    pub fn resolve(&self, enabled: &[String]) -> Result<Vec<Integration>, RegistryError> {
        if enabled.is_empty() {
            return Ok(self.integrations.clone());
        }
        enabled
            .iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| RegistryError::Unknown(id.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_unique() {
        let registry = Registry::builtin();
        let mut ids: Vec<_> = registry.ids().collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(total, 7);
    }

    #[test]
    fn test_resolve() {
        let registry = Registry::builtin();
        let picked = registry
            .resolve(&["gutenberg".to_string(), "bricks".to_string()])
            .unwrap();
        assert_eq!(picked.iter().map(|i| i.id).collect::<Vec<_>>(), ["gutenberg", "bricks"]);
        assert_eq!(registry.resolve(&[]).unwrap().len(), 7);
        assert!(matches!(
            registry.resolve(&["nope".to_string()]),
            Err(RegistryError::Unknown(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_capabilities() {
        let registry = Registry::builtin();
        assert!(registry.get("bricks").unwrap().has(Capability::VariableSync));
        assert!(!registry.get("beaver").unwrap().has(Capability::VariableSync));
        assert!(registry.get("beaver").unwrap().has(Capability::SaveDetector));
    }
}
