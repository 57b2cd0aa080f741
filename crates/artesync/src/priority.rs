//! Fixed priority tiers for cross-type ordering.
//!
//! Coarse-grained ordering between artefact types that holds even when no
//! explicit dependency edge exists: roles are applied before access rules,
//! access rules before jobs, schemas before tables, and so on. Only the
//! relative order of the tiers is a contract; the numeric values are not.

use std::collections::HashMap;

/// Lookup table mapping artefact type tags to integer tiers (lower first).
#[derive(Debug, Clone)]
pub struct PriorityTable {
    tiers: HashMap<String, u32>,
}

impl PriorityTable {
    /// Creates an empty table with no assigned tiers.
    pub fn empty() -> Self {
        Self {
            tiers: HashMap::new(),
        }
    }

    /// Creates the built-in table covering the known artefact types.
    pub fn builtin() -> Self {
        let mut tiers = HashMap::new();
        for (tier, ty) in [
            "extension-point",
            "extension",
            "role",
            "access",
            "job",
            "listener",
            "expose",
            "openapi",
            "websocket",
            "datasource",
            "schema",
            "table",
            "view",
            "entity",
            "bpmn",
            "odata",
            "csvim",
            "markdown",
        ]
        .iter()
        .enumerate()
        {
            tiers.insert(ty.to_string(), (tier as u32 + 1) * 10);
        }
        Self { tiers }
    }

    /// Assigns (or overrides) a tier for a custom artefact type.
    pub fn with_tier(mut self, artefact_type: impl Into<String>, tier: u32) -> Self {
        self.tiers.insert(artefact_type.into(), tier);
        self
    }

    /// Returns the tier for an artefact type, if one is assigned.
    pub fn tier_of(&self, artefact_type: &str) -> Option<u32> {
        self.tiers.get(artefact_type).copied()
    }

    /// Returns the number of assigned tiers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Returns true if no tiers are assigned.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Tests
// ============================================================================
