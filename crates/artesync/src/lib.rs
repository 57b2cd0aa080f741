//! Dependency-aware reconciliation engine for file-declared artefacts.
//!
//! A project registry declares runtime artefacts (roles, access rules,
//! jobs, schemas, tables, ...) as files. This crate reconciles that
//! declared set against persisted runtime state:
//! - a pluggable per-type [`Synchronizer`] contract,
//! - a cross-type fixpoint processing algorithm ([`TopologicalDepleter`]),
//! - an artefact lifecycle/state model,
//! - a cycle-scoped error/state sink ([`SynchronizerCallback`]),
//! - a [`SyncCoordinator`] driving discover → parse → process → cleanup,
//! - scheduling and file-watch plumbing around it.

pub mod artefact;
pub mod callback;
pub mod coordinator;
pub mod error;
pub mod priority;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod synchronizer;
pub mod topology;
pub mod watcher;

pub use artefact::{Artefact, ArtefactLifecycle, ArtefactPhase, ArtefactState};
pub use callback::SynchronizerCallback;
pub use coordinator::{CycleReport, RegistrySnapshot, SourceFile, SyncCoordinator};
pub use error::{Result, SyncError};
pub use priority::PriorityTable;
pub use registry::SynchronizerRegistry;
pub use scanner::{DirectoryScanner, RegistryScanner};
pub use scheduler::SyncScheduler;
pub use store::{
    ArtefactStore, Definition, DefinitionStore, InMemoryArtefactStore, InMemoryDefinitionStore,
};
pub use synchronizer::Synchronizer;
pub use topology::{Depletion, TopologicalDepleter, TopologyWrapper};
pub use watcher::{BackgroundRegistryWatcher, RegistryWatcher};
