//! Commit graph capability used by the stack transaction engine.
//!
//! Objects are immutable: every operation either reads existing objects or
//! creates new ones and returns their identifiers. Identifiers are full
//! lowercase hex object ids.

use crate::errors::Result;

/// Author identity of a commit, carried over when a patch is re-created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
    /// Seconds since the epoch
    pub time: i64,
    /// Offset from UTC in minutes
    pub offset_minutes: i32,
}

/// Everything needed to create a commit besides its tree and parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub message: String,
    /// `None` uses the configured identity
    pub author: Option<Author>,
}

impl CommitData {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            author: None,
        }
    }
}

/// A resolved commit object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
    pub author: Author,
}

impl CommitInfo {
    /// First parent, if any
    pub fn parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }

    /// Data to re-create this commit elsewhere in the graph
    pub fn data(&self) -> CommitData {
        CommitData {
            message: self.message.clone(),
            author: Some(self.author.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    TypeChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// Files that differ between two commits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// Result of an in-memory three-way tree merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMerge {
    Clean(String),
    Conflicted(Vec<String>),
}

/// Read and create immutable commit objects
pub trait CommitGraph {
    fn create_commit(&self, tree: &str, parents: &[&str], data: &CommitData) -> Result<String>;

    fn resolve(&self, id: &str) -> Result<CommitInfo>;

    fn diff(&self, from_commit: &str, to_commit: &str) -> Result<ChangeSet>;

    fn merge_trees(&self, base: &str, ours: &str, theirs: &str) -> Result<TreeMerge>;
}
