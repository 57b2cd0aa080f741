//! The per-type synchronizer plugin contract.
//!
//! One stateless implementation per artefact kind, registered once at
//! process start. All per-artefact state lives in the rows the plugin
//! manages through its own persistence collaborator; the cycle-scoped
//! callback is passed by reference into every call that reports outcomes.

use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase, ArtefactState};
use crate::callback::SynchronizerCallback;
use crate::error::Result;
use crate::topology::TopologyWrapper;

/// Capability set every artefact-kind plugin exposes to the engine.
pub trait Synchronizer: Send + Sync {
    /// The type discriminator this plugin owns.
    fn artefact_type(&self) -> &str;

    /// The file extension this plugin owns, including the leading dot.
    fn file_extension(&self) -> &str;

    /// Returns true if this plugin owns files at the given location.
    fn accepts_location(&self, location: &str) -> bool {
        location.ends_with(self.file_extension())
    }

    /// Returns true if this plugin owns the given type discriminator.
    fn accepts_type(&self, type_tag: &str) -> bool {
        type_tag == self.artefact_type()
    }

    /// Deserializes file content into one or more artefacts.
    ///
    /// Assigns keys and upserts the artefacts into the plugin's store:
    /// lifecycle `Created` for a new key, `Updated` for a known one.
    /// Re-parsing unchanged content must not create duplicates. A parse
    /// failure is recorded against this location only and does not abort
    /// the cycle.
    fn parse(&self, location: &str, content: &[u8]) -> Result<Vec<Artefact>>;

    /// Returns the previously persisted artefacts for a location.
    fn retrieve(&self, location: &str) -> Result<Vec<Artefact>>;

    /// Persists a status/message transition for one artefact.
    fn set_status(
        &self,
        artefact: &Artefact,
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
        message: &str,
    ) -> Result<()>;

    /// Performs the actual side effect for the given phase once all
    /// dependencies are satisfied. Must be safe to retry: an already
    /// converged artefact is detected and reported as success without
    /// further side effects.
    fn complete(
        &self,
        wrapper: &TopologyWrapper,
        phase: ArtefactPhase,
        callback: &mut SynchronizerCallback,
    ) -> bool;

    /// Removes runtime effects and the persisted row for an artefact
    /// whose source file no longer exists.
    fn cleanup(&self, artefact: &Artefact, callback: &mut SynchronizerCallback) -> Result<()>;
}
