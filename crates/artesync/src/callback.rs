//! Cycle-scoped error/state sink.
//!
//! Created fresh by the coordinator for every cycle and passed by
//! reference into plugin calls, so no state leaks across cycles.

use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase, ArtefactState};
use crate::synchronizer::Synchronizer;
use crate::topology::TopologyWrapper;

/// Records per-artefact outcomes and aggregates failures for one cycle.
#[derive(Default)]
pub struct SynchronizerCallback {
    errors: Vec<String>,
}

impl SynchronizerCallback {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends a free-form cycle-level error.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.errors.push(message);
    }

    /// The errors accumulated so far this cycle.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Bulk-marks every wrapper in `remained` as failed for the phase and
    /// appends a summary error per wrapper.
    pub fn register_errors(&mut self, remained: &[TopologyWrapper], phase: ArtefactPhase) {
        for wrapper in remained {
            let message = format!(
                "Undepleted artefact of type [{}] with key [{}] in phase [{}]",
                wrapper.artefact().artefact_type,
                wrapper.key(),
                phase
            );
            log::error!("{message}");
            self.errors.push(message.clone());
            self.register_state(
                wrapper.synchronizer().as_ref(),
                wrapper.artefact(),
                phase.lifecycle(),
                phase.failed_state(),
                &message,
            );
        }
    }

    /// Records one artefact's outcome and persists it via the owning
    /// synchronizer. A failed persistence attempt is itself recorded as a
    /// cycle error.
    pub fn register_state(
        &mut self,
        synchronizer: &dyn Synchronizer,
        artefact: &Artefact,
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
        message: &str,
    ) {
        log::debug!(
            "Processed artefact with key: {} for state: {}",
            artefact.key,
            state
        );
        if let Err(e) = synchronizer.set_status(artefact, lifecycle, state, message) {
            self.add_error(format!(
                "Failed to persist state {} for artefact with key [{}]: {}",
                state, artefact.key, e
            ));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::store::{ArtefactStore, InMemoryArtefactStore};
    use std::sync::Arc;

    struct RecordingSynchronizer {
        store: Arc<InMemoryArtefactStore>,
    }

    impl Synchronizer for RecordingSynchronizer {
        fn artefact_type(&self) -> &str {
            "role"
        }

        fn file_extension(&self) -> &str {
            ".role"
        }

        fn parse(&self, _location: &str, _content: &[u8]) -> Result<Vec<Artefact>> {
            Ok(Vec::new())
        }

        fn retrieve(&self, location: &str) -> Result<Vec<Artefact>> {
            self.store.list_by_location(location)
        }

        fn set_status(
            &self,
            artefact: &Artefact,
            lifecycle: ArtefactLifecycle,
            state: ArtefactState,
            message: &str,
        ) -> Result<()> {
            let mut updated = artefact.clone();
            updated.lifecycle = lifecycle;
            updated.state = state;
            updated.error = if state.is_successful() || message.is_empty() {
                None
            } else {
                Some(message.to_string())
            };
            updated.touch();
            self.store.save(&updated)
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
            artefact: &Artefact,
            _callback: &mut SynchronizerCallback,
        ) -> Result<()> {
            self.store.delete_by_key(&artefact.key)
        }
    }

    #[test]
    fn test_add_error_accumulates() {
        let mut callback = SynchronizerCallback::new();
        callback.add_error("first");
        callback.add_error("second");
        assert_eq!(callback.errors(), ["first", "second"]);
    }

    #[test]
    fn test_register_errors_marks_failed_and_counts() {
        let store = Arc::new(InMemoryArtefactStore::new());
        let sync = Arc::new(RecordingSynchronizer {
            store: store.clone(),
        });

        let mut wrappers = Vec::new();
        for name in ["a", "b", "c"] {
            let artefact = Artefact::new("role", format!("/p/{name}.role"), name);
            store.save(&artefact).unwrap();
            wrappers.push(TopologyWrapper::new(
                artefact,
                sync.clone() as Arc<dyn Synchronizer>,
                30,
            ));
        }

        let mut callback = SynchronizerCallback::new();
        callback.register_errors(&wrappers, ArtefactPhase::Create);

        assert_eq!(callback.errors().len(), 3);
        assert!(callback.errors()[0].contains("Undepleted artefact"));
        for wrapper in &wrappers {
            let row = store.find_by_key(wrapper.key()).unwrap().unwrap();
            assert_eq!(row.state, ArtefactState::FailedCreateUpdate);
            assert!(row.error.is_some());
        }
    }

    #[test]
    fn test_register_state_persists_success_and_clears_error() {
        let store = Arc::new(InMemoryArtefactStore::new());
        let sync = RecordingSynchronizer {
            store: store.clone(),
        };

        let mut artefact = Artefact::new("role", "/p/admin.role", "admin");
        artefact.error = Some("previous failure".to_string());
        store.save(&artefact).unwrap();

        let mut callback = SynchronizerCallback::new();
        callback.register_state(
            &sync,
            &artefact,
            ArtefactLifecycle::Created,
            ArtefactState::SuccessfulCreateUpdate,
            "",
        );

        let row = store.find_by_key(&artefact.key).unwrap().unwrap();
        assert_eq!(row.state, ArtefactState::SuccessfulCreateUpdate);
        assert!(row.error.is_none());
        assert!(callback.errors().is_empty());
    }
}
