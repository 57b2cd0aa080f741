//! Synchronization coordinator: drives one full reconciliation cycle.
//!
//! discover → parse → topologically process (create/update) → detect
//! removals → process (delete) → cleanup → report. A cycle runs to
//! completion once started; a trigger arriving while one is in progress
//! is skipped via a try-lock guard, never run concurrently.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase, ArtefactState};
use crate::callback::SynchronizerCallback;
use crate::error::{Result, SyncError};
use crate::registry::SynchronizerRegistry;
use crate::store::{Definition, DefinitionStore};
use crate::synchronizer::Synchronizer;
use crate::topology::{TopologicalDepleter, TopologyWrapper};

/// One registry file as delivered by the scanner.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub location: String,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(location: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            location: location.into(),
            content: content.into(),
        }
    }
}

/// Per-cycle discovery input: the current files plus the locations that
/// existed in the previous cycle but no longer do.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub files: Vec<SourceFile>,
    pub vanished: Vec<String>,
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// True when the cycle was skipped because another was in progress.
    pub skipped: bool,
    /// Artefacts parsed from new, changed or not yet converged files.
    pub parsed: usize,
    /// Files skipped because content and state were already converged.
    pub unmodified: usize,
    /// Artefacts whose create/update phase completed.
    pub completed: usize,
    /// Artefacts left undepleted at the end of the create/update phase.
    pub remained: usize,
    /// Orphaned artefacts whose delete phase completed.
    pub deleted: usize,
    /// Orphaned artefacts fully cleaned up from the store.
    pub cleaned_up: usize,
    /// Errors accumulated by the cycle callback.
    pub errors: Vec<String>,
}

/// Reconciles the declared artefact set against persisted runtime state.
pub struct SyncCoordinator {
    registry: Arc<SynchronizerRegistry>,
    definitions: Arc<dyn DefinitionStore>,
    /// Prevents overlapping cycles; a trigger during a cycle is skipped.
    cycle_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(registry: Arc<SynchronizerRegistry>, definitions: Arc<dyn DefinitionStore>) -> Self {
        Self {
            registry,
            definitions,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<SynchronizerRegistry> {
        &self.registry
    }

    /// Runs one full reconciliation cycle over the given snapshot.
    ///
    /// Idempotent: re-running with unchanged files does not change final
    /// state or raise errors beyond those already present. Store failures
    /// outside plugin calls abort the cycle; the next tick starts fresh.
    pub fn run_cycle(&self, snapshot: &RegistrySnapshot) -> Result<CycleReport> {
        let _guard = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::info!("Cycle skipped: another cycle is already in progress");
                return Ok(CycleReport {
                    skipped: true,
                    ..Default::default()
                });
            }
        };

        log::debug!(
            "Processing cycle started: {} files, {} vanished locations",
            snapshot.files.len(),
            snapshot.vanished.len()
        );

        let mut callback = SynchronizerCallback::new();
        let mut report = CycleReport::default();

        let collected = self.collect_files(snapshot, &mut report)?;
        let artefacts = self.parse_files(collected, &mut callback)?;
        report.parsed = artefacts.len();

        let wrappers = self.wrap(artefacts)?;

        let depleter = TopologicalDepleter::new();
        let depletion = depleter.deplete(wrappers, ArtefactPhase::Create, &mut callback);
        callback.register_errors(&depletion.remained, ArtefactPhase::Create);
        for wrapper in &depletion.completed {
            callback.register_state(
                wrapper.synchronizer().as_ref(),
                wrapper.artefact(),
                wrapper.artefact().lifecycle,
                ArtefactState::SuccessfulCreateUpdate,
                "successful",
            );
        }
        report.completed = depletion.completed.len();
        report.remained = depletion.remained.len();

        self.settle_definitions(&depletion.completed, &depletion.remained)?;

        let (orphans, orphan_locations) = self.detect_orphans(snapshot)?;
        let delete_wrappers = reverse_wrap(orphans);
        let deletion = depleter.deplete(delete_wrappers, ArtefactPhase::Delete, &mut callback);
        callback.register_errors(&deletion.remained, ArtefactPhase::Delete);
        report.deleted = deletion.completed.len();

        // a location with a failed delete or cleanup keeps its definition
        // row, so the next cycle detects it again and retries
        let mut unsettled: HashSet<String> = deletion
            .remained
            .iter()
            .map(|w| w.artefact().location.clone())
            .collect();
        for wrapper in &deletion.completed {
            callback.register_state(
                wrapper.synchronizer().as_ref(),
                wrapper.artefact(),
                ArtefactLifecycle::Deleted,
                ArtefactState::SuccessfulDelete,
                "successful",
            );
            if let Err(e) = wrapper.synchronizer().cleanup(wrapper.artefact(), &mut callback) {
                callback.add_error(format!(
                    "Failed to clean up artefact with key [{}]: {e}",
                    wrapper.key()
                ));
                unsettled.insert(wrapper.artefact().location.clone());
                continue;
            }
            report.cleaned_up += 1;
        }
        for location in &orphan_locations {
            if unsettled.contains(location) {
                continue;
            }
            self.definitions.delete_by_location(location)?;
        }

        report.errors = callback.errors().to_vec();
        log::debug!(
            "Processing cycle done: {} completed, {} remained, {} deleted, {} errors",
            report.completed,
            report.remained,
            report.deleted,
            report.errors.len()
        );
        Ok(report)
    }

    /// Change detection: keep only files that are new, modified, or not
    /// yet converged; skip converged locations with unchanged content.
    fn collect_files<'a>(
        &self,
        snapshot: &'a RegistrySnapshot,
        report: &mut CycleReport,
    ) -> Result<Vec<(&'a SourceFile, Arc<dyn Synchronizer>)>> {
        let mut collected = Vec::new();
        for file in &snapshot.files {
            let Some(synchronizer) = self.registry.find_by_location(&file.location) else {
                log::debug!("No synchronizer owns file: {}", file.location);
                continue;
            };
            let checksum = Definition::checksum_of(&file.content);
            match self.definitions.find_by_location(&file.location)? {
                Some(mut definition) => {
                    if definition.checksum != checksum {
                        definition.checksum = checksum;
                        definition.lifecycle = ArtefactLifecycle::Updated;
                        definition.message = None;
                        self.definitions.save(&definition)?;
                        collected.push((file, synchronizer));
                    } else if definition.lifecycle == ArtefactLifecycle::Unmodified {
                        report.unmodified += 1;
                    } else {
                        // pending or failed from a previous run
                        collected.push((file, synchronizer));
                    }
                }
                None => {
                    let definition = Definition::new(
                        &file.location,
                        base_name(&file.location),
                        synchronizer.artefact_type(),
                        &file.content,
                    );
                    self.definitions.save(&definition)?;
                    collected.push((file, synchronizer));
                }
            }
        }
        Ok(collected)
    }

    /// Parses collected files; a parse failure is recorded against its
    /// location only and the cycle continues.
    fn parse_files(
        &self,
        collected: Vec<(&SourceFile, Arc<dyn Synchronizer>)>,
        callback: &mut SynchronizerCallback,
    ) -> Result<Vec<Artefact>> {
        let mut artefacts = Vec::new();
        for (file, synchronizer) in collected {
            match synchronizer.parse(&file.location, &file.content) {
                Ok(mut parsed) => artefacts.append(&mut parsed),
                Err(e) => {
                    callback.add_error(e.to_string());
                    if let Some(mut definition) =
                        self.definitions.find_by_location(&file.location)?
                    {
                        definition.message = Some(e.to_string());
                        self.definitions.save(&definition)?;
                    }
                }
            }
        }
        Ok(artefacts)
    }

    /// Wraps parsed artefacts and merges them into one cross-type
    /// topology ordered by priority tier.
    fn wrap(&self, artefacts: Vec<Artefact>) -> Result<Vec<TopologyWrapper>> {
        let mut wrappers = Vec::with_capacity(artefacts.len());
        for artefact in artefacts {
            let synchronizer = self
                .registry
                .find_by_type(&artefact.artefact_type)
                .ok_or_else(|| SyncError::UnknownArtefactType(artefact.artefact_type.clone()))?;
            let tier = self.registry.tier_of(&artefact.artefact_type)?;
            wrappers.push(TopologyWrapper::new(artefact, synchronizer, tier));
        }
        Ok(wrappers)
    }

    /// Marks the definitions of fully converged locations `Unmodified`
    /// so the next cycle can skip them.
    fn settle_definitions(
        &self,
        completed: &[TopologyWrapper],
        remained: &[TopologyWrapper],
    ) -> Result<()> {
        let unsettled: HashSet<&str> = remained
            .iter()
            .map(|w| w.artefact().location.as_str())
            .collect();
        for wrapper in completed {
            let location = &wrapper.artefact().location;
            if unsettled.contains(location.as_str()) {
                continue;
            }
            if let Some(mut definition) = self.definitions.find_by_location(location)? {
                if definition.lifecycle != ArtefactLifecycle::Unmodified {
                    definition.lifecycle = ArtefactLifecycle::Unmodified;
                    definition.message = None;
                    self.definitions.save(&definition)?;
                }
            }
        }
        Ok(())
    }

    /// Finds the artefacts whose source file is gone: every location with
    /// a definition row but no file in the snapshot, plus anything the
    /// scanner reports as vanished. Driving this off persisted state means
    /// an orphan whose delete failed is picked up again next cycle.
    fn detect_orphans(
        &self,
        snapshot: &RegistrySnapshot,
    ) -> Result<(Vec<(Artefact, Arc<dyn Synchronizer>, u32)>, Vec<String>)> {
        let current: HashSet<&str> = snapshot
            .files
            .iter()
            .map(|f| f.location.as_str())
            .collect();
        let mut locations: BTreeSet<String> = snapshot.vanished.iter().cloned().collect();
        for definition in self.definitions.list_all()? {
            if !current.contains(definition.location.as_str()) {
                locations.insert(definition.location);
            }
        }

        let mut orphans = Vec::new();
        for location in &locations {
            let Some(synchronizer) = self.registry.find_by_location(location) else {
                continue;
            };
            for artefact in synchronizer.retrieve(location)? {
                let tier = self.registry.tier_of(&artefact.artefact_type)?;
                // a single file may yield artefacts of mixed types
                let owner = match self.registry.find_by_type(&artefact.artefact_type) {
                    Some(owner) => owner,
                    None => synchronizer.clone(),
                };
                orphans.push((artefact, owner, tier));
            }
        }
        Ok((orphans, locations.into_iter().collect()))
    }
}

/// Wraps orphans for the delete phase: dependency edges are reversed so
/// a dependent is deleted before its dependency, and tiers are inverted
/// so coarse cross-type order reverses as well.
fn reverse_wrap(orphans: Vec<(Artefact, Arc<dyn Synchronizer>, u32)>) -> Vec<TopologyWrapper> {
    let keys: HashSet<String> = orphans.iter().map(|(a, _, _)| a.key.clone()).collect();
    let mut reversed: HashMap<String, Vec<String>> = HashMap::new();
    for (artefact, _, _) in &orphans {
        for dependency in &artefact.dependencies {
            if keys.contains(dependency) {
                reversed
                    .entry(dependency.clone())
                    .or_default()
                    .push(artefact.key.clone());
            }
        }
    }
    orphans
        .into_iter()
        .map(|(artefact, synchronizer, tier)| {
            let dependencies = reversed.remove(&artefact.key).unwrap_or_default();
            TopologyWrapper::with_dependencies(artefact, dependencies, synchronizer, u32::MAX - tier)
        })
        .collect()
}

fn base_name(location: &str) -> String {
    let file = location.rsplit('/').next().unwrap_or(location);
    file.split('.').next().unwrap_or(file).to_string()
}

// ============================================================================
// Tests
// ============================================================================
