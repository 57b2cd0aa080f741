//! Persistence contracts and in-memory reference implementations.
//!
//! The engine never talks to a database directly: each plugin owns the
//! rows of its own artefact type through an [`ArtefactStore`], and the
//! coordinator tracks per-file checksums through a [`DefinitionStore`].
//! Both are specified as contracts only; the in-memory implementations
//! back embedded use and the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artefact::{Artefact, ArtefactLifecycle};
use crate::error::{Result, SyncError};

/// Keyed artefact persistence owned by one plugin.
pub trait ArtefactStore: Send + Sync {
    /// Returns the artefact with the given key, if present.
    fn find_by_key(&self, key: &str) -> Result<Option<Artefact>>;

    /// Inserts or replaces the artefact identified by its key.
    fn save(&self, artefact: &Artefact) -> Result<()>;

    /// Removes the artefact with the given key. Removing a missing key
    /// is not an error.
    fn delete_by_key(&self, key: &str) -> Result<()>;

    /// Returns all artefacts parsed from the given location.
    fn list_by_location(&self, location: &str) -> Result<Vec<Artefact>>;

    /// Returns all persisted artefacts.
    fn list_all(&self) -> Result<Vec<Artefact>>;
}

/// In-memory artefact store.
#[derive(Default)]
pub struct InMemoryArtefactStore {
    rows: Mutex<HashMap<String, Artefact>>,
}

impl InMemoryArtefactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtefactStore for InMemoryArtefactStore {
    fn find_by_key(&self, key: &str) -> Result<Option<Artefact>> {
        let rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        Ok(rows.get(key).cloned())
    }

    fn save(&self, artefact: &Artefact) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        rows.insert(artefact.key.clone(), artefact.clone());
        Ok(())
    }

    fn delete_by_key(&self, key: &str) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        rows.remove(key);
        Ok(())
    }

    fn list_by_location(&self, location: &str) -> Result<Vec<Artefact>> {
        let rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        let mut found: Vec<Artefact> = rows
            .values()
            .filter(|a| a.location == location)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    fn list_all(&self) -> Result<Vec<Artefact>> {
        let rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        let mut all: Vec<Artefact> = rows.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}

/// One registry file as last seen by the coordinator: its checksum and
/// how far its artefacts have converged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub location: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artefact_type: String,
    pub checksum: String,
    pub lifecycle: ArtefactLifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Definition {
    /// Creates a definition for freshly discovered content, lifecycle
    /// `Created`.
    pub fn new(
        location: impl Into<String>,
        name: impl Into<String>,
        artefact_type: impl Into<String>,
        content: &[u8],
    ) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
            artefact_type: artefact_type.into(),
            checksum: Self::checksum_of(content),
            lifecycle: ArtefactLifecycle::Created,
            message: None,
        }
    }

    /// SHA-256 checksum of raw file content, hex-encoded.
    pub fn checksum_of(content: &[u8]) -> String {
        let digest = Sha256::digest(content);
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

/// Per-location definition persistence used for change detection.
pub trait DefinitionStore: Send + Sync {
    fn find_by_location(&self, location: &str) -> Result<Option<Definition>>;

    fn save(&self, definition: &Definition) -> Result<()>;

    /// Removing a missing location is not an error.
    fn delete_by_location(&self, location: &str) -> Result<()>;

    fn list_all(&self) -> Result<Vec<Definition>>;
}

/// In-memory definition store.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    rows: Mutex<HashMap<String, Definition>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn find_by_location(&self, location: &str) -> Result<Option<Definition>> {
        let rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        Ok(rows.get(location).cloned())
    }

    fn save(&self, definition: &Definition) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        rows.insert(definition.location.clone(), definition.clone());
        Ok(())
    }

    fn delete_by_location(&self, location: &str) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        rows.remove(location);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Definition>> {
        let rows = self.rows.lock().map_err(|e| SyncError::Store(e.to_string()))?;
        let mut all: Vec<Definition> = rows.values().cloned().collect();
        all.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(all)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::ArtefactState;

    #[test]
    fn test_save_is_upsert_by_key() {
        let store = InMemoryArtefactStore::new();
        let mut artefact = Artefact::new("role", "/p/sec.role", "admin");
        store.save(&artefact).unwrap();

        artefact.state = ArtefactState::SuccessfulCreateUpdate;
        store.save(&artefact).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, ArtefactState::SuccessfulCreateUpdate);
    }

    #[test]
    fn test_list_by_location() {
        let store = InMemoryArtefactStore::new();
        store
            .save(&Artefact::new("table", "/p/orders.schema", "ORDERS"))
            .unwrap();
        store
            .save(&Artefact::new("view", "/p/orders.schema", "ORDERS_V"))
            .unwrap();
        store
            .save(&Artefact::new("role", "/p/sec.role", "admin"))
            .unwrap();

        let found = store.list_by_location("/p/orders.schema").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let store = InMemoryArtefactStore::new();
        store.delete_by_key("nope").unwrap();
    }

    #[test]
    fn test_checksum_is_stable_and_content_sensitive() {
        let a = Definition::checksum_of(b"alpha");
        let b = Definition::checksum_of(b"alpha");
        let c = Definition::checksum_of(b"beta");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_definition_store_round_trip() {
        let store = InMemoryDefinitionStore::new();
        let mut definition = Definition::new("/p/sec.role", "sec", "role", b"{}");
        store.save(&definition).unwrap();

        definition.lifecycle = ArtefactLifecycle::Unmodified;
        store.save(&definition).unwrap();

        let found = store.find_by_location("/p/sec.role").unwrap().unwrap();
        assert_eq!(found.lifecycle, ArtefactLifecycle::Unmodified);

        store.delete_by_location("/p/sec.role").unwrap();
        assert!(store.find_by_location("/p/sec.role").unwrap().is_none());
    }
}
