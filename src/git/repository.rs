use super::graph::{
    Author, ChangeKind, ChangeSet, CommitData, CommitGraph, CommitInfo, FileChange, TreeMerge,
};
use crate::errors::{Result, StackError};
use git2::{Delta, Oid, Repository, Signature, StatusOptions, Time};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Repository information
#[derive(Debug, Clone)]
pub struct RepositoryInfo {
    pub path: PathBuf,
    pub head_branch: Option<String>,
    pub head_commit: Option<String>,
    pub is_dirty: bool,
}

/// Wrapper around git2::Repository with safe operations
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
    identity: Option<(String, String)>,
}

pub(crate) fn parse_oid(id: &str) -> Result<Oid> {
    Oid::from_str(id).map_err(StackError::Git)
}

/// Paths that have conflict entries in the given index
pub(crate) fn conflicted_paths(index: &git2::Index) -> Result<Vec<String>> {
    let mut conflicts = Vec::new();

    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref());
        if let Some(entry) = entry {
            if let Ok(path) = std::str::from_utf8(&entry.path) {
                conflicts.push(path.to_string());
            }
        }
    }

    conflicts.sort();
    conflicts.dedup();
    Ok(conflicts)
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| StackError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| StackError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
            identity: None,
        })
    }

    /// Use a fixed committer identity instead of git config
    pub fn with_identity(mut self, name: Option<String>, email: Option<String>) -> Self {
        if let (Some(name), Some(email)) = (name, email) {
            self.identity = Some((name, email));
        }
        self
    }

    /// Get repository information
    pub fn get_info(&self) -> Result<RepositoryInfo> {
        Ok(RepositoryInfo {
            path: self.path.clone(),
            head_branch: self.get_current_branch().ok(),
            head_commit: self.get_head_commit_hash().ok(),
            is_dirty: self.is_dirty()?,
        })
    }

    /// Get repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current branch name
    pub fn get_current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| StackError::config(format!("Could not get HEAD: {e}")))?;

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(name.to_string());
            }
        }

        Err(StackError::validation(
            "HEAD is detached; check out a branch first",
        ))
    }

    /// Get the HEAD commit hash
    pub fn get_head_commit_hash(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| StackError::config(format!("Could not get HEAD: {e}")))?;

        let commit = head
            .peel_to_commit()
            .map_err(|e| StackError::config(format!("Could not get HEAD commit: {e}")))?;

        Ok(commit.id().to_string())
    }

    /// Check for staged or unstaged modifications of tracked files
    pub fn is_dirty(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        for status in statuses.iter() {
            if status.status().intersects(
                git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_NEW
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_TYPECHANGE
                    | git2::Status::CONFLICTED,
            ) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// The repository index as it is on disk now.
    ///
    /// libgit2 caches the index per repository handle; staging done by
    /// `git add` or another handle is only seen after a reload.
    fn fresh_index(&self) -> Result<git2::Index> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }

    /// Check for merge conflicts in the index
    pub fn has_conflicts(&self) -> Result<bool> {
        Ok(self.fresh_index()?.has_conflicts())
    }

    /// Get list of conflicted files
    pub fn get_conflicted_files(&self) -> Result<Vec<String>> {
        conflicted_paths(&self.fresh_index()?)
    }

    /// Get the commit hash at the head of a branch
    pub fn get_branch_head(&self, branch_name: &str) -> Result<String> {
        let branch = self
            .repo
            .find_branch(branch_name, git2::BranchType::Local)
            .map_err(|e| {
                StackError::config(format!("Could not find branch '{branch_name}': {e}"))
            })?;

        let commit = branch.get().peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Point a local branch at a commit without touching the working tree
    pub fn set_branch_head(&self, branch_name: &str, commit_hash: &str, message: &str) -> Result<()> {
        let oid = parse_oid(commit_hash)?;
        self.repo
            .reference(&format!("refs/heads/{branch_name}"), oid, true, message)?;
        tracing::debug!("Moved {} to {}", branch_name, commit_hash);
        Ok(())
    }

    /// Keep a patch commit reachable under refs/patches/<branch>/<patch>
    pub fn set_patch_ref(&self, branch_name: &str, patch: &str, commit_hash: &str) -> Result<()> {
        let oid = parse_oid(commit_hash)?;
        self.repo.reference(
            &patch_ref_name(branch_name, patch),
            oid,
            true,
            "patchstack: update patch",
        )?;
        Ok(())
    }

    /// Remove a patch ref; a missing ref is not an error
    pub fn delete_patch_ref(&self, branch_name: &str, patch: &str) -> Result<()> {
        match self.repo.find_reference(&patch_ref_name(branch_name, patch)) {
            Ok(mut reference) => {
                reference.delete()?;
                Ok(())
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(StackError::Git(e)),
        }
    }

    /// Commit a patch ref points at, if it exists
    pub fn get_patch_ref(&self, branch_name: &str, patch: &str) -> Option<String> {
        self.repo
            .refname_to_id(&patch_ref_name(branch_name, patch))
            .ok()
            .map(|oid| oid.to_string())
    }

    /// Make the keep refs under refs/patchstack/keep/<branch>/ cover exactly
    /// `commits`
    pub fn sync_keep_refs(&self, branch_name: &str, commits: &BTreeSet<String>) -> Result<()> {
        let prefix = keep_ref_prefix(branch_name);
        let mut present = BTreeSet::new();

        for reference in self.repo.references_glob(&format!("{prefix}*"))? {
            let mut reference = reference?;
            let Some(id) = reference
                .name()
                .and_then(|name| name.strip_prefix(&prefix))
                .map(str::to_string)
            else {
                continue;
            };
            // Nested names belong to another branch's keep refs
            if id.contains('/') {
                continue;
            }
            if commits.contains(&id) {
                present.insert(id);
            } else {
                reference.delete()?;
            }
        }

        for id in commits.difference(&present) {
            self.repo.reference(
                &format!("{prefix}{id}"),
                parse_oid(id)?,
                true,
                "patchstack: keep log commit",
            )?;
        }
        tracing::debug!("{} keep ref(s) for {}", commits.len(), branch_name);
        Ok(())
    }

    /// Commits held by keep refs of a branch
    pub fn keep_refs(&self, branch_name: &str) -> Result<BTreeSet<String>> {
        let prefix = keep_ref_prefix(branch_name);
        let mut ids = BTreeSet::new();
        for name in self.repo.references_glob(&format!("{prefix}*"))?.names() {
            if let Some(id) = name?.strip_prefix(&prefix) {
                if !id.contains('/') {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Resolve a revision (branch name, tag, or commit hash) to a commit hash
    pub fn resolve_revision(&self, revision: &str) -> Result<String> {
        let obj = self.repo.revparse_single(revision).map_err(|e| {
            StackError::validation(format!("Could not resolve revision '{revision}': {e}"))
        })?;

        let commit = obj.peel_to_commit().map_err(|e| {
            StackError::validation(format!(
                "Revision '{revision}' does not point to a commit: {e}"
            ))
        })?;

        Ok(commit.id().to_string())
    }

    /// Write the current index as a tree and return its id
    pub fn index_tree(&self) -> Result<String> {
        let mut index = self.fresh_index()?;
        if index.has_conflicts() {
            return Err(StackError::conflict(
                "The index has unresolved conflicts",
            ));
        }
        Ok(index.write_tree()?.to_string())
    }

    /// Get a signature for commits
    fn get_signature(&self) -> Result<Signature<'static>> {
        if let Some((name, email)) = &self.identity {
            return Ok(Signature::now(name, email)?);
        }

        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Ok(Signature::now(&name, &email)?);
            }
        }

        Ok(Signature::now("Patchstack", "patchstack@example.com")?)
    }
}

/// Full ref name that keeps a patch commit alive
pub fn patch_ref_name(branch_name: &str, patch: &str) -> String {
    format!("refs/patches/{branch_name}/{patch}")
}

fn keep_ref_prefix(branch_name: &str) -> String {
    format!("refs/patchstack/keep/{branch_name}/")
}

impl CommitGraph for GitRepository {
    fn create_commit(&self, tree: &str, parents: &[&str], data: &CommitData) -> Result<String> {
        let tree = self.repo.find_tree(parse_oid(tree)?)?;

        let parents = parents
            .iter()
            .map(|id| Ok(self.repo.find_commit(parse_oid(id)?)?))
            .collect::<Result<Vec<_>>>()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let committer = self.get_signature()?;
        let author = match &data.author {
            Some(author) => Signature::new(
                &author.name,
                &author.email,
                &Time::new(author.time, author.offset_minutes),
            )?,
            None => committer.clone(),
        };

        let oid = self
            .repo
            .commit(None, &author, &committer, &data.message, &tree, &parent_refs)?;

        tracing::debug!("Created commit {}", oid);
        Ok(oid.to_string())
    }

    fn resolve(&self, id: &str) -> Result<CommitInfo> {
        let commit = self.repo.find_commit(parse_oid(id)?)?;
        let author = commit.author();

        Ok(CommitInfo {
            id: commit.id().to_string(),
            tree: commit.tree_id().to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author: Author {
                name: author.name().unwrap_or("").to_string(),
                email: author.email().unwrap_or("").to_string(),
                time: author.when().seconds(),
                offset_minutes: author.when().offset_minutes(),
            },
        })
    }

    fn diff(&self, from_commit: &str, to_commit: &str) -> Result<ChangeSet> {
        let from_tree = self.repo.find_commit(parse_oid(from_commit)?)?.tree()?;
        let to_tree = self.repo.find_commit(parse_oid(to_commit)?)?.tree()?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)?;

        let changes = diff
            .deltas()
            .map(|delta| {
                let kind = match delta.status() {
                    Delta::Added | Delta::Copied => ChangeKind::Added,
                    Delta::Deleted => ChangeKind::Deleted,
                    Delta::Renamed => ChangeKind::Renamed,
                    Delta::Typechange => ChangeKind::TypeChanged,
                    _ => ChangeKind::Modified,
                };
                let path = delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                FileChange { path, kind }
            })
            .collect();

        Ok(ChangeSet { changes })
    }

    fn merge_trees(&self, base: &str, ours: &str, theirs: &str) -> Result<TreeMerge> {
        let base = self.repo.find_tree(parse_oid(base)?)?;
        let ours = self.repo.find_tree(parse_oid(ours)?)?;
        let theirs = self.repo.find_tree(parse_oid(theirs)?)?;

        let mut index = self.repo.merge_trees(&base, &ours, &theirs, None)?;

        if index.has_conflicts() {
            return Ok(TreeMerge::Conflicted(conflicted_paths(&index)?));
        }

        let tree = index.write_tree_to(&self.repo)?;
        Ok(TreeMerge::Clean(tree.to_string()))
    }
}
