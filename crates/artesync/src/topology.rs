//! Topology wrappers and the fixpoint depleter.
//!
//! The depleter drains a batch of wrapped artefacts in dependency order by
//! repeatedly scanning for ready wrappers until a full scan makes no
//! progress. It requires no topological sort or cycle detection up front:
//! forward references and unordered discovery are handled by the rescans,
//! and termination is guaranteed because every scan either completes at
//! least one wrapper or ends the loop.

use std::collections::HashSet;
use std::sync::Arc;

use crate::artefact::{Artefact, ArtefactPhase};
use crate::callback::SynchronizerCallback;
use crate::synchronizer::Synchronizer;

/// An artefact paired with its resolved dependency keys for one
/// processing run. Never persisted.
pub struct TopologyWrapper {
    artefact: Artefact,
    dependencies: Vec<String>,
    synchronizer: Arc<dyn Synchronizer>,
    tier: u32,
    processed: bool,
}

impl TopologyWrapper {
    /// Wraps an artefact with the dependencies it declares.
    pub fn new(artefact: Artefact, synchronizer: Arc<dyn Synchronizer>, tier: u32) -> Self {
        let dependencies = artefact.dependencies.clone();
        Self {
            artefact,
            dependencies,
            synchronizer,
            tier,
            processed: false,
        }
    }

    /// Wraps an artefact with an explicit dependency list, used for the
    /// delete phase where edges are reversed.
    pub fn with_dependencies(
        artefact: Artefact,
        dependencies: Vec<String>,
        synchronizer: Arc<dyn Synchronizer>,
        tier: u32,
    ) -> Self {
        Self {
            artefact,
            dependencies,
            synchronizer,
            tier,
            processed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.artefact.key
    }

    pub fn artefact(&self) -> &Artefact {
        &self.artefact
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn synchronizer(&self) -> &Arc<dyn Synchronizer> {
        &self.synchronizer
    }

    pub fn tier(&self) -> u32 {
        self.tier
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    fn mark_processed(&mut self) {
        self.processed = true;
    }
}

impl std::fmt::Debug for TopologyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyWrapper")
            .field("key", &self.artefact.key)
            .field("dependencies", &self.dependencies)
            .field("tier", &self.tier)
            .field("processed", &self.processed)
            .finish()
    }
}

/// Result of one depleter run.
pub struct Depletion {
    /// Wrappers whose `complete` succeeded, in completion order.
    pub completed: Vec<TopologyWrapper>,
    /// Wrappers that could not be processed: dependencies that never
    /// became satisfiable (missing or cyclic) and artefacts whose own
    /// `complete` failed on every attempt. The two are deliberately not
    /// distinguished.
    pub remained: Vec<TopologyWrapper>,
}

/// Fixpoint algorithm draining a topology of wrapped artefacts.
#[derive(Debug, Default)]
pub struct TopologicalDepleter;

impl TopologicalDepleter {
    pub fn new() -> Self {
        Self
    }

    /// Processes the batch for the given phase until no further progress
    /// is possible.
    ///
    /// A wrapper is ready when every dependency key is either already
    /// completed or not a member of this batch at all (an external or
    /// already-settled dependency). Scan order is (tier, key) so output
    /// is deterministic regardless of discovery order.
    pub fn deplete(
        &self,
        mut wrappers: Vec<TopologyWrapper>,
        phase: ArtefactPhase,
        callback: &mut SynchronizerCallback,
    ) -> Depletion {
        wrappers.sort_by(|a, b| a.tier().cmp(&b.tier()).then_with(|| a.key().cmp(b.key())));

        let members: HashSet<String> = wrappers.iter().map(|w| w.key().to_string()).collect();
        let mut done: HashSet<String> = HashSet::new();
        let mut completed: Vec<TopologyWrapper> = Vec::new();

        loop {
            let mut progressed = false;
            let mut pending: Vec<TopologyWrapper> = Vec::with_capacity(wrappers.len());

            for mut wrapper in wrappers {
                let ready = wrapper
                    .dependencies()
                    .iter()
                    .all(|dep| done.contains(dep) || !members.contains(dep));

                if !ready {
                    pending.push(wrapper);
                    continue;
                }

                let succeeded = wrapper
                    .synchronizer()
                    .clone()
                    .complete(&wrapper, phase, callback);
                if succeeded {
                    log::debug!("Depleted artefact with key: {} in phase: {}", wrapper.key(), phase);
                    done.insert(wrapper.key().to_string());
                    wrapper.mark_processed();
                    completed.push(wrapper);
                    progressed = true;
                } else {
                    log::debug!(
                        "Artefact with key: {} not depleted in phase: {}, will retry this run",
                        wrapper.key(),
                        phase
                    );
                    pending.push(wrapper);
                }
            }

            wrappers = pending;
            if !progressed || wrappers.is_empty() {
                break;
            }
        }

        Depletion {
            completed,
            remained: wrappers,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
