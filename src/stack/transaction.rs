//! Stack transactions.
//!
//! A transaction is a shadow of the stack record: a small overlay of patch
//! commits on top of the manager's record plus its own copy of the order
//! and base. Push, pop, fold and friends only touch the shadow (and, when a
//! merge needs real files, the working tree). `run` is the single point where
//! refs, the stack record and the branch are updated.
//!
//! A conflicting push halts the transaction instead of failing it. Later
//! pushes are refused, but `run` still persists everything done so far.

use super::log::LogRecord;
use super::manager::StackManager;
use super::stack::{PatchOrder, PatchRecord, StackState};
use crate::errors::{Result, StackError};
use crate::git::{CommitGraph, MergeOutcome, TreeMerge, Worktree};
use crate::utils::patch_names::validate_patch_name;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Whether the caller may keep issuing operations
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halted,
}

impl Flow {
    pub fn is_halted(self) -> bool {
        self == Flow::Halted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Halted,
}

/// How a push produced its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// Applied without touching the working tree
    Clean,
    /// Needed a merge against the working tree
    Modified,
    /// The change was already present; the patch is now empty
    Empty,
    /// Already built on the current top; the commit is reused
    Unmodified,
    /// Left conflicts behind
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOp {
    Pop { patch: String },
    Push { patch: String, status: PushStatus },
    Fold { patches: Vec<String> },
    NewPatch { patch: String },
    Refresh { patch: String },
    Uncommit { patch: String },
    SetBase { commit: String },
    Reset,
}

/// Result of finalizing a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Completed,
    /// Progress was persisted but a conflict stopped the transaction
    Halted {
        reason: String,
        conflicts: Vec<String>,
    },
}

impl TransactionOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(self, TransactionOutcome::Halted { .. })
    }

    /// Turn a halt into an error so commands exit with the halt status
    pub fn into_result(self) -> Result<()> {
        match self {
            TransactionOutcome::Completed => Ok(()),
            TransactionOutcome::Halted { reason, .. } => Err(StackError::halted(reason)),
        }
    }
}

pub struct StackTransaction<'a> {
    manager: &'a mut StackManager,
    purpose: String,
    /// Overlay over the record; `None` marks a patch removed from the stack
    patches: HashMap<String, Option<String>>,
    applied: Vec<String>,
    unapplied: Vec<String>,
    base: String,
    /// Tree the index and working tree currently show
    current_tree: String,
    /// Conflict markers are in the working tree and must survive `run`
    keep_worktree: bool,
    status: TransactionStatus,
    halt_reason: Option<String>,
    conflicts: Vec<String>,
    operations: Vec<TransactionOp>,
    record: LogRecord,
}

impl<'a> StackTransaction<'a> {
    /// Snapshot the manager's stack into a new shadow
    pub fn begin(manager: &'a mut StackManager, purpose: &str) -> Result<Self> {
        let state = &manager.stack().state;
        let applied = state.order.applied.clone();
        let unapplied = state.order.unapplied.clone();
        let base = state.base.clone();
        let current_tree = manager.git_repo().resolve(state.top())?.tree;

        debug!(
            "Begin '{}' transaction on {} ({} applied, {} unapplied)",
            purpose,
            manager.branch(),
            applied.len(),
            unapplied.len()
        );

        Ok(Self {
            manager,
            purpose: purpose.to_string(),
            patches: HashMap::new(),
            applied,
            unapplied,
            base,
            current_tree,
            keep_worktree: false,
            status: TransactionStatus::Open,
            halt_reason: None,
            conflicts: Vec::new(),
            operations: Vec::new(),
            record: LogRecord::command(),
        })
    }

    /// Record an undo or redo entry instead of a plain command
    pub fn with_log_record(mut self, record: LogRecord) -> Self {
        self.record = record;
        self
    }

    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    pub fn unapplied(&self) -> &[String] {
        &self.unapplied
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == TransactionStatus::Halted
    }

    pub fn operations(&self) -> &[TransactionOp] {
        &self.operations
    }

    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    /// Commit of a patch, reading the overlay before the record
    pub fn patch_commit(&self, name: &str) -> Option<&str> {
        match self.patches.get(name) {
            Some(commit) => commit.as_deref(),
            None => self.manager.stack().state.patch_commit(name),
        }
    }

    /// Commit of the top applied patch, or the base
    pub fn top(&self) -> &str {
        self.applied
            .last()
            .and_then(|name| self.patch_commit(name))
            .unwrap_or(self.base.as_str())
    }

    /// Commit graph of the underlying repository
    pub fn graph(&self) -> &dyn CommitGraph {
        self.manager.git_repo()
    }

    fn is_known(&self, name: &str) -> bool {
        self.applied.iter().chain(self.unapplied.iter()).any(|n| n == name)
    }

    fn halt(&mut self, reason: String, conflicts: Vec<String>) -> Flow {
        warn!("{}", reason);
        self.status = TransactionStatus::Halted;
        self.halt_reason = Some(reason);
        self.conflicts = conflicts;
        Flow::Halted
    }

    /// Pop the lowest applied patch matching `predicate` and everything above
    /// it. Returns the popped names top to bottom; they move to the front of
    /// the unapplied list in their stack order. Commits are kept as they are.
    pub fn pop_patches<F>(&mut self, predicate: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let Some(lowest) = self.applied.iter().position(|name| predicate(name)) else {
            return Vec::new();
        };

        let popped = self.applied.split_off(lowest);

        let mut unapplied = popped.clone();
        unapplied.append(&mut self.unapplied);
        self.unapplied = unapplied;

        let popped: Vec<String> = popped.into_iter().rev().collect();
        for name in &popped {
            debug!("Popped {}", name);
            self.operations.push(TransactionOp::Pop {
                patch: name.clone(),
            });
        }
        popped
    }

    /// Apply an unapplied patch on top of the current top.
    ///
    /// Returns `Flow::Halted` if the transaction is, or becomes, halted.
    pub fn push_patch(&mut self, name: &str, iw: &mut dyn Worktree) -> Result<Flow> {
        if self.is_halted() {
            debug!("Not pushing {} on a halted transaction", name);
            return Ok(Flow::Halted);
        }

        let Some(position) = self.unapplied.iter().position(|n| n == name) else {
            if self.applied.iter().any(|n| n == name) {
                return Err(StackError::invalid_operation(format!(
                    "Patch '{name}' is already applied"
                )));
            }
            return Err(StackError::validation(format!("Unknown patch '{name}'")));
        };

        let commit = self
            .patch_commit(name)
            .ok_or_else(|| StackError::corruption(format!("Patch '{name}' has no commit")))?
            .to_string();
        let top = self.top().to_string();

        let orig = self.graph().resolve(&commit)?;
        let old_parent = orig
            .parent()
            .ok_or_else(|| {
                StackError::corruption(format!("Patch '{name}' commit {commit} has no parent"))
            })?
            .to_string();

        let (new_commit, push_status) = if old_parent == top {
            (commit, PushStatus::Unmodified)
        } else {
            let base_tree = self.graph().resolve(&old_parent)?.tree;
            let ours_tree = self.graph().resolve(&top)?.tree;

            let merged = if base_tree == ours_tree {
                Some((orig.tree.clone(), PushStatus::Clean))
            } else {
                match self.graph().merge_trees(&base_tree, &ours_tree, &orig.tree)? {
                    TreeMerge::Clean(tree) => Some((tree, PushStatus::Clean)),
                    TreeMerge::Conflicted(paths) => {
                        debug!(
                            "In-memory merge of {} conflicted in {} path(s)",
                            name,
                            paths.len()
                        );
                        None
                    }
                }
            };

            let (tree, push_status) = match merged {
                Some(result) => result,
                None => {
                    if !self.manager.settings().stack.allow_push_conflicts {
                        return Ok(self.halt(
                            format!("{name} does not apply cleanly"),
                            Vec::new(),
                        ));
                    }

                    iw.checkout(&self.current_tree, &ours_tree)?;
                    self.current_tree = ours_tree.clone();

                    match iw.merge(&base_tree, &ours_tree, &orig.tree)? {
                        MergeOutcome::Clean(tree) => {
                            self.current_tree = tree.clone();
                            (tree, PushStatus::Modified)
                        }
                        MergeOutcome::Conflicted(paths) => {
                            // Applied as an empty patch so the conflicts can be resolved on top
                            let id = self
                                .graph()
                                .create_commit(&ours_tree, &[&top], &orig.data())?;
                            self.patches.insert(name.to_string(), Some(id));
                            self.unapplied.remove(position);
                            self.applied.push(name.to_string());
                            self.keep_worktree = true;
                            self.operations.push(TransactionOp::Push {
                                patch: name.to_string(),
                                status: PushStatus::Conflict,
                            });

                            let reason = format!(
                                "{} conflict(s) while pushing '{name}'; resolve them and run 'pstk refresh'",
                                paths.len()
                            );
                            return Ok(self.halt(reason, paths));
                        }
                    }
                }
            };

            let push_status = if tree == ours_tree {
                PushStatus::Empty
            } else {
                push_status
            };
            let id = self.graph().create_commit(&tree, &[&top], &orig.data())?;
            (id, push_status)
        };

        debug!("Pushed {} ({:?})", name, push_status);
        self.patches.insert(name.to_string(), Some(new_commit));
        self.unapplied.remove(position);
        self.applied.push(name.to_string());
        self.operations.push(TransactionOp::Push {
            patch: name.to_string(),
            status: push_status,
        });
        Ok(Flow::Continue)
    }

    /// Push several patches in order, stopping at the first halt
    pub fn push_patches(&mut self, names: &[String], iw: &mut dyn Worktree) -> Result<Flow> {
        for name in names {
            if self.push_patch(name, iw)?.is_halted() {
                return Ok(Flow::Halted);
            }
        }
        Ok(Flow::Continue)
    }

    /// Fold a bottom prefix of the applied patches into the base.
    ///
    /// The base becomes the commit of the last folded patch; no commit is
    /// created.
    pub fn fold_into_base(&mut self, names: &[String]) -> Result<()> {
        let Some(last) = names.last() else {
            return Err(StackError::validation("No patches to commit"));
        };
        if names.len() > self.applied.len() || self.applied[..names.len()] != *names {
            return Err(StackError::invalid_operation(format!(
                "Only the bottom applied patches can be folded, got {}",
                names.join(", ")
            )));
        }

        let new_base = self
            .patch_commit(last)
            .ok_or_else(|| StackError::corruption(format!("Patch '{last}' has no commit")))?
            .to_string();

        for name in names {
            self.patches.insert(name.clone(), None);
        }
        self.applied.drain(..names.len());
        self.base = new_base;

        debug!("Folded {} into base {}", names.join(", "), self.base);
        self.operations.push(TransactionOp::Fold {
            patches: names.to_vec(),
        });
        Ok(())
    }

    /// Record a commit built on the current top as a new top patch
    pub fn new_patch(&mut self, name: &str, commit: &str) -> Result<()> {
        validate_patch_name(name)?;
        if self.is_known(name) {
            return Err(StackError::validation(format!(
                "Patch '{name}' already exists"
            )));
        }

        let info = self.graph().resolve(commit)?;
        if info.parent() != Some(self.top()) {
            return Err(StackError::invalid_operation(format!(
                "Commit {} is not built on the stack top",
                info.short_id()
            )));
        }

        self.patches.insert(name.to_string(), Some(commit.to_string()));
        self.applied.push(name.to_string());
        self.current_tree = info.tree;
        self.operations.push(TransactionOp::NewPatch {
            patch: name.to_string(),
        });
        Ok(())
    }

    /// Replace the top patch's commit with one built on the same parent
    pub fn refresh_top(&mut self, commit: &str) -> Result<()> {
        let Some(name) = self.applied.last().cloned() else {
            return Err(StackError::validation("No patches applied"));
        };
        let old = self.graph().resolve(self.top())?;
        let info = self.graph().resolve(commit)?;
        if info.parent() != old.parent() {
            return Err(StackError::invalid_operation(format!(
                "Commit {} does not replace patch '{name}'",
                info.short_id()
            )));
        }

        self.patches.insert(name.clone(), Some(commit.to_string()));
        self.current_tree = info.tree;
        self.operations.push(TransactionOp::Refresh { patch: name });
        Ok(())
    }

    /// Turn the base commit into a new bottom patch
    pub fn uncommit(&mut self, name: &str) -> Result<()> {
        validate_patch_name(name)?;
        if self.is_known(name) {
            return Err(StackError::validation(format!(
                "Patch '{name}' already exists"
            )));
        }

        let info = self.graph().resolve(&self.base)?;
        let parent = match info.parents.as_slice() {
            [parent] => parent.clone(),
            [] => {
                return Err(StackError::invalid_operation(format!(
                    "Cannot uncommit {}: it is a root commit",
                    info.short_id()
                )))
            }
            _ => {
                return Err(StackError::invalid_operation(format!(
                    "Cannot uncommit {}: it is a merge commit",
                    info.short_id()
                )))
            }
        };

        self.patches.insert(name.to_string(), Some(info.id));
        self.applied.insert(0, name.to_string());
        self.base = parent;
        self.operations.push(TransactionOp::Uncommit {
            patch: name.to_string(),
        });
        Ok(())
    }

    /// Move the base; only allowed with nothing applied
    pub fn set_base(&mut self, commit: &str) -> Result<()> {
        if !self.applied.is_empty() {
            return Err(StackError::invalid_operation(
                "Cannot move the base while patches are applied",
            ));
        }
        self.graph().resolve(commit)?;
        self.base = commit.to_string();
        self.operations.push(TransactionOp::SetBase {
            commit: commit.to_string(),
        });
        Ok(())
    }

    /// Make the shadow equal to a previously recorded state
    pub fn reset_to_state(&mut self, state: &StackState) -> Result<()> {
        let current: HashSet<String> = self
            .applied
            .iter()
            .chain(self.unapplied.iter())
            .cloned()
            .collect();

        for name in current {
            if !state.patches.contains_key(&name) {
                self.patches.insert(name, None);
            }
        }
        for (name, record) in &state.patches {
            self.graph().resolve(&record.commit)?;
            self.patches.insert(name.clone(), Some(record.commit.clone()));
        }

        self.applied = state.order.applied.clone();
        self.unapplied = state.order.unapplied.clone();
        self.base = state.base.clone();
        self.operations.push(TransactionOp::Reset);
        Ok(())
    }

    fn build_state(&self) -> Result<StackState> {
        let old = &self.manager.stack().state;
        let mut patches = BTreeMap::new();

        for name in self.applied.iter().chain(self.unapplied.iter()) {
            let commit = self.patch_commit(name).ok_or_else(|| {
                StackError::corruption(format!("Patch '{name}' has no commit"))
            })?;

            let record = match old.patches.get(name) {
                Some(existing) if existing.commit == commit => existing.clone(),
                Some(existing) => PatchRecord {
                    commit: commit.to_string(),
                    created_at: existing.created_at,
                    updated_at: Utc::now(),
                },
                None => PatchRecord::new(commit.to_string()),
            };
            patches.insert(name.clone(), record);
        }

        Ok(StackState {
            base: self.base.clone(),
            order: PatchOrder {
                applied: self.applied.clone(),
                unapplied: self.unapplied.clone(),
            },
            patches,
        })
    }

    /// Finalize: write patch refs, the stack record and the branch, then
    /// bring the working tree to the new top
    pub fn run(self, iw: &mut dyn Worktree) -> Result<TransactionOutcome> {
        let new_state = self.build_state()?;
        let old_state = self.manager.stack().state.clone();
        let branch = self.manager.branch().to_string();

        {
            let repo = self.manager.git_repo();
            for (name, record) in &new_state.patches {
                if repo.get_patch_ref(&branch, name).as_deref() != Some(record.commit.as_str()) {
                    repo.set_patch_ref(&branch, name, &record.commit)?;
                }
            }
        }

        let top = new_state.top().to_string();
        let top_tree = self.manager.git_repo().resolve(&top)?.tree;
        let patch_count = new_state.patches.len();

        self.manager
            .commit_state(&self.purpose, new_state.clone(), self.record)?;

        let repo = self.manager.git_repo();
        repo.set_branch_head(&branch, &top, &format!("patchstack: {}", self.purpose))?;

        if !self.keep_worktree {
            iw.checkout(&self.current_tree, &top_tree)?;
        }

        for name in old_state.patches.keys() {
            if !new_state.patches.contains_key(name) {
                repo.delete_patch_ref(&branch, name)?;
            }
        }

        info!(
            "Finished '{}' on {}: {} patch(es), {} applied",
            self.purpose,
            branch,
            patch_count,
            new_state.order.applied.len()
        );

        Ok(match self.status {
            TransactionStatus::Open => TransactionOutcome::Completed,
            TransactionStatus::Halted => TransactionOutcome::Halted {
                reason: self
                    .halt_reason
                    .unwrap_or_else(|| "Transaction halted".to_string()),
                conflicts: self.conflicts,
            },
        })
    }
}
