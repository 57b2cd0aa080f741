//! The artefact entity and its lifecycle/state model.
//!
//! An artefact is one declared, identity-bearing unit of desired state,
//! parsed from a registry file. Its `key` uniquely identifies a node in
//! the dependency graph; the `lifecycle` tracks the phase of the current
//! operation and the `state` records the outcome of the last attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when constructing artefact keys.
const KEY_SEPARATOR: char = ':';

/// Default principal recorded in audit fields.
const SYSTEM_USER: &str = "system";

/// One declared unit of desired runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artefact {
    /// Stable identity derived from (type, location, name).
    pub key: String,

    /// Source file path this artefact was parsed from.
    pub location: String,

    /// The unique name of the artefact within its file.
    pub name: String,

    /// Artefact kind discriminator; maps to exactly one synchronizer.
    #[serde(rename = "type")]
    pub artefact_type: String,

    /// Keys of other artefacts that must converge before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Phase of the current operation.
    pub lifecycle: ArtefactLifecycle,

    /// Outcome of the last attempted operation.
    pub state: ArtefactState,

    /// Last failure message; cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl Artefact {
    /// Creates a new artefact with lifecycle `Created` and state `New`.
    pub fn new(
        artefact_type: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let artefact_type = artefact_type.into();
        let location = location.into();
        let name = name.into();
        let now = Utc::now();
        Self {
            key: Self::construct_key(&artefact_type, &location, &name),
            location,
            name,
            artefact_type,
            dependencies: Vec::new(),
            lifecycle: ArtefactLifecycle::Created,
            state: ArtefactState::New,
            error: None,
            created_by: SYSTEM_USER.to_string(),
            created_at: now,
            updated_by: SYSTEM_USER.to_string(),
            updated_at: now,
        }
    }

    /// Constructs the stable key for an artefact identity.
    ///
    /// This is the single place the key format lives.
    pub fn construct_key(artefact_type: &str, location: &str, name: &str) -> String {
        format!("{artefact_type}{KEY_SEPARATOR}{location}{KEY_SEPARATOR}{name}")
    }

    /// Adds a dependency on another artefact identified by its components.
    pub fn add_dependency(&mut self, artefact_type: &str, location: &str, name: &str) {
        self.dependencies
            .push(Self::construct_key(artefact_type, location, name));
    }

    /// Adds a dependency on another artefact by its full key.
    pub fn add_dependency_key(&mut self, key: impl Into<String>) {
        self.dependencies.push(key.into());
    }

    /// Updates the audit timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Phase of the operation currently applied to an artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactLifecycle {
    Created,
    Updated,
    Deleted,
    Unmodified,
}

impl std::fmt::Display for ArtefactLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtefactLifecycle::Created => write!(f, "CREATED"),
            ArtefactLifecycle::Updated => write!(f, "UPDATED"),
            ArtefactLifecycle::Deleted => write!(f, "DELETED"),
            ArtefactLifecycle::Unmodified => write!(f, "UNMODIFIED"),
        }
    }
}

/// Recorded outcome of the last attempted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactState {
    New,
    SuccessfulCreateUpdate,
    FailedCreateUpdate,
    SuccessfulDelete,
    FailedDelete,
}

impl ArtefactState {
    /// Returns true if the state records a successful outcome.
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            ArtefactState::SuccessfulCreateUpdate | ArtefactState::SuccessfulDelete
        )
    }
}

impl std::fmt::Display for ArtefactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtefactState::New => write!(f, "NEW"),
            ArtefactState::SuccessfulCreateUpdate => write!(f, "SUCCESSFUL_CREATE_UPDATE"),
            ArtefactState::FailedCreateUpdate => write!(f, "FAILED_CREATE_UPDATE"),
            ArtefactState::SuccessfulDelete => write!(f, "SUCCESSFUL_DELETE"),
            ArtefactState::FailedDelete => write!(f, "FAILED_DELETE"),
        }
    }
}

/// Processing phase fed to the depleter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactPhase {
    Create,
    Delete,
}

impl ArtefactPhase {
    /// The lifecycle an artefact enters when this phase is applied.
    pub fn lifecycle(&self) -> ArtefactLifecycle {
        match self {
            ArtefactPhase::Create => ArtefactLifecycle::Created,
            ArtefactPhase::Delete => ArtefactLifecycle::Deleted,
        }
    }

    /// The state recorded when this phase succeeds.
    pub fn successful_state(&self) -> ArtefactState {
        match self {
            ArtefactPhase::Create => ArtefactState::SuccessfulCreateUpdate,
            ArtefactPhase::Delete => ArtefactState::SuccessfulDelete,
        }
    }

    /// The state recorded when this phase fails.
    pub fn failed_state(&self) -> ArtefactState {
        match self {
            ArtefactPhase::Create => ArtefactState::FailedCreateUpdate,
            ArtefactPhase::Delete => ArtefactState::FailedDelete,
        }
    }
}

impl std::fmt::Display for ArtefactPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtefactPhase::Create => write!(f, "CREATE"),
            ArtefactPhase::Delete => write!(f, "DELETE"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
