use super::log::LogEntry;
use crate::git::CommitGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Version of the on-disk stack record
pub const STACK_FORMAT_VERSION: u32 = 1;

/// A named patch and the commit currently backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    /// Commit hash
    pub commit: String,
    /// When this patch was created
    pub created_at: DateTime<Utc>,
    /// When the commit was last replaced
    pub updated_at: DateTime<Utc>,
}

impl PatchRecord {
    pub fn new(commit: String) -> Self {
        let now = Utc::now();
        Self {
            commit,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Disjoint partition of patch names into applied (bottom first) and unapplied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOrder {
    pub applied: Vec<String>,
    pub unapplied: Vec<String>,
}

impl PatchOrder {
    /// Applied then unapplied
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.applied.iter().chain(self.unapplied.iter())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().any(|n| n == name)
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.applied.iter().any(|n| n == name)
    }
}

/// Everything a transaction reads and finally replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackState {
    /// Commit the bottom applied patch is built on
    pub base: String,
    pub order: PatchOrder,
    pub patches: BTreeMap<String, PatchRecord>,
}

impl StackState {
    pub fn new(base: String) -> Self {
        Self {
            base,
            order: PatchOrder::default(),
            patches: BTreeMap::new(),
        }
    }

    pub fn patch_commit(&self, name: &str) -> Option<&str> {
        self.patches.get(name).map(|p| p.commit.as_str())
    }

    /// Commit of the top applied patch, or the base
    pub fn top(&self) -> &str {
        self.order
            .applied
            .last()
            .and_then(|name| self.patch_commit(name))
            .unwrap_or(self.base.as_str())
    }

    /// Check the partition and the patch mapping agree
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for name in self.order.all() {
            if !seen.insert(name.as_str()) {
                return Err(format!("Patch '{name}' appears more than once in the series"));
            }
            if !self.patches.contains_key(name) {
                return Err(format!("Patch '{name}' has no recorded commit"));
            }
        }

        for name in self.patches.keys() {
            if !seen.contains(name.as_str()) {
                return Err(format!("Patch '{name}' is not in the series"));
            }
        }

        Ok(())
    }

    /// Walk base -> applied[0] -> applied[1] ... checking first parents
    pub fn validate_chain(&self, graph: &dyn CommitGraph) -> Result<(), String> {
        let mut expected_parent = self.base.as_str();

        for name in &self.order.applied {
            let commit = self
                .patch_commit(name)
                .ok_or_else(|| format!("Patch '{name}' has no recorded commit"))?;
            let info = graph
                .resolve(commit)
                .map_err(|e| format!("Patch '{name}' points to a missing commit {commit}: {e}"))?;

            if info.parent() != Some(expected_parent) {
                return Err(format!(
                    "Patch '{name}' ({}) is not built on {}",
                    info.short_id(),
                    &expected_parent[..expected_parent.len().min(8)]
                ));
            }
            expected_parent = commit;
        }

        Ok(())
    }
}

/// The persisted record of one branch's patch stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub version: u32,
    /// Branch the stack is bound to
    pub name: String,
    pub state: StackState,
    /// Undo history, oldest first
    #[serde(default)]
    pub log: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new(name: String, base: String) -> Self {
        let now = Utc::now();
        Self {
            version: STACK_FORMAT_VERSION,
            name,
            state: StackState::new(base),
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn applied(&self) -> &[String] {
        &self.state.order.applied
    }

    pub fn unapplied(&self) -> &[String] {
        &self.state.order.unapplied
    }

    pub fn base(&self) -> &str {
        &self.state.base
    }

    pub fn top(&self) -> &str {
        self.state.top()
    }

    pub fn is_empty(&self) -> bool {
        self.state.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.patches.len()
    }
}
