//! Ordered collection of synchronizer plugins.
//!
//! Populated once at startup and never mutated during a cycle. The
//! registration order visible to callers is the fixed priority tier
//! order, then the artefact type for determinism within a tier.

use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::priority::PriorityTable;
use crate::synchronizer::Synchronizer;

/// Registry routing locations and type tags to their owning plugin.
pub struct SynchronizerRegistry {
    synchronizers: Vec<(u32, Arc<dyn Synchronizer>)>,
    priorities: PriorityTable,
}

impl SynchronizerRegistry {
    /// Creates a registry with the built-in priority table.
    pub fn new() -> Self {
        Self::with_priorities(PriorityTable::builtin())
    }

    /// Creates a registry with a custom priority table.
    pub fn with_priorities(priorities: PriorityTable) -> Self {
        Self {
            synchronizers: Vec::new(),
            priorities,
        }
    }

    /// Registers a plugin, validating that its artefact type has an
    /// assigned priority tier and is not already taken.
    pub fn register(&mut self, synchronizer: Arc<dyn Synchronizer>) -> Result<()> {
        let artefact_type = synchronizer.artefact_type().to_string();
        let tier = self
            .priorities
            .tier_of(&artefact_type)
            .ok_or_else(|| SyncError::NoPriorityTier(artefact_type.clone()))?;
        if self
            .synchronizers
            .iter()
            .any(|(_, s)| s.artefact_type() == artefact_type)
        {
            return Err(SyncError::DuplicateSynchronizer(artefact_type));
        }
        self.synchronizers.push((tier, synchronizer));
        self.synchronizers.sort_by(|(ta, a), (tb, b)| {
            ta.cmp(tb)
                .then_with(|| a.artefact_type().cmp(b.artefact_type()))
        });
        Ok(())
    }

    /// Finds the plugin owning files at the given location.
    pub fn find_by_location(&self, location: &str) -> Option<Arc<dyn Synchronizer>> {
        self.synchronizers
            .iter()
            .find(|(_, s)| s.accepts_location(location))
            .map(|(_, s)| s.clone())
    }

    /// Finds the plugin owning the given type discriminator.
    pub fn find_by_type(&self, type_tag: &str) -> Option<Arc<dyn Synchronizer>> {
        self.synchronizers
            .iter()
            .find(|(_, s)| s.accepts_type(type_tag))
            .map(|(_, s)| s.clone())
    }

    /// Returns the priority tier for an artefact type.
    pub fn tier_of(&self, type_tag: &str) -> Result<u32> {
        self.priorities
            .tier_of(type_tag)
            .ok_or_else(|| SyncError::NoPriorityTier(type_tag.to_string()))
    }

    /// Iterates the plugins in tier order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Synchronizer>> {
        self.synchronizers.iter().map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}

impl Default for SynchronizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase, ArtefactState};
    use crate::callback::SynchronizerCallback;
    use crate::topology::TopologyWrapper;

    struct NamedSynchronizer {
        artefact_type: &'static str,
        extension: &'static str,
    }

    impl Synchronizer for NamedSynchronizer {
        fn artefact_type(&self) -> &str {
            self.artefact_type
        }

        fn file_extension(&self) -> &str {
            self.extension
        }

        fn parse(&self, _location: &str, _content: &[u8]) -> Result<Vec<Artefact>> {
            Ok(Vec::new())
        }

        fn retrieve(&self, _location: &str) -> Result<Vec<Artefact>> {
            Ok(Vec::new())
        }

        fn set_status(
            &self,
            _artefact: &Artefact,
            _lifecycle: ArtefactLifecycle,
            _state: ArtefactState,
            _message: &str,
        ) -> Result<()> {
            Ok(())
        }

        fn complete(
            &self,
            _wrapper: &TopologyWrapper,
            _phase: ArtefactPhase,
            _callback: &mut SynchronizerCallback,
        ) -> bool {
            true
        }

        fn cleanup(
            &self,
            _artefact: &Artefact,
            _callback: &mut SynchronizerCallback,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn plugin(artefact_type: &'static str, extension: &'static str) -> Arc<dyn Synchronizer> {
        Arc::new(NamedSynchronizer {
            artefact_type,
            extension,
        })
    }

    #[test]
    fn test_register_orders_by_tier() {
        let mut registry = SynchronizerRegistry::new();
        registry.register(plugin("table", ".table")).unwrap();
        registry.register(plugin("role", ".role")).unwrap();
        registry.register(plugin("schema", ".schema")).unwrap();

        let order: Vec<&str> = registry.iter().map(|s| s.artefact_type()).collect();
        assert_eq!(order, vec!["role", "schema", "table"]);
    }

    #[test]
    fn test_register_rejects_missing_tier() {
        let mut registry = SynchronizerRegistry::new();
        let err = registry.register(plugin("widget", ".widget")).unwrap_err();
        assert!(matches!(err, SyncError::NoPriorityTier(ty) if ty == "widget"));
    }

    #[test]
    fn test_register_rejects_duplicate_type() {
        let mut registry = SynchronizerRegistry::new();
        registry.register(plugin("role", ".role")).unwrap();
        let err = registry.register(plugin("role", ".role")).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateSynchronizer(ty) if ty == "role"));
    }

    #[test]
    fn test_routing_by_location_and_type() {
        let mut registry = SynchronizerRegistry::new();
        registry.register(plugin("role", ".role")).unwrap();
        registry.register(plugin("job", ".job")).unwrap();

        let by_location = registry.find_by_location("/project/security.role").unwrap();
        assert_eq!(by_location.artefact_type(), "role");

        let by_type = registry.find_by_type("job").unwrap();
        assert_eq!(by_type.file_extension(), ".job");

        assert!(registry.find_by_location("/project/readme.txt").is_none());
        assert!(registry.find_by_type("widget").is_none());
    }

    #[test]
    fn test_custom_priority_table() {
        let priorities = PriorityTable::empty().with_tier("widget", 5);
        let mut registry = SynchronizerRegistry::with_priorities(priorities);
        registry.register(plugin("widget", ".widget")).unwrap();
        assert_eq!(registry.tier_of("widget").unwrap(), 5);
    }
}
