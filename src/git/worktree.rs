//! Index and working tree synchronisation for stack operations.

use super::repository::{conflicted_paths, parse_oid};
use crate::errors::{Result, StackError};
use git2::build::CheckoutBuilder;
use git2::{Delta, FileMode, ObjectType, Repository, StatusOptions, TreeWalkMode, TreeWalkResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of a three-way merge performed against the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Clean(String),
    Conflicted(Vec<String>),
}

/// Materialises stack states in the index and working directory
pub trait Worktree {
    /// Switch from `from_tree` to `to_tree`, touching only files that differ
    fn checkout(&mut self, from_tree: &str, to_tree: &str) -> Result<()>;

    /// Merge `theirs` into `ours` relative to `base`. The working tree must
    /// currently show `ours`. Conflicts are written as markers.
    fn merge(&mut self, base: &str, ours: &str, theirs: &str) -> Result<MergeOutcome>;

    /// No staged or unstaged changes to tracked files
    fn is_clean(&self) -> Result<bool>;
}

/// Worktree implementation backed by the repository's own index and workdir
pub struct IndexAndWorktree {
    repo: Repository,
    workdir: PathBuf,
}

impl IndexAndWorktree {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| StackError::config(format!("Not a git repository: {e}")))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| StackError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self { repo, workdir })
    }

    fn write_entry(&self, relative: &Path, blob_id: git2::Oid, mode: FileMode) -> Result<()> {
        let target = self.workdir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(&target).is_ok() {
            remove_path(&target)?;
        }

        let blob = self.repo.find_blob(blob_id)?;
        match mode {
            FileMode::Link => write_symlink(&target, blob.content())?,
            FileMode::BlobExecutable => {
                fs::write(&target, blob.content())?;
                set_executable(&target)?;
            }
            FileMode::Commit => {
                debug!("Skipping submodule entry {}", relative.display());
            }
            _ => fs::write(&target, blob.content())?,
        }
        Ok(())
    }

    fn remove_entry(&self, relative: &Path) -> Result<()> {
        let target = self.workdir.join(relative);
        match fs::symlink_metadata(&target) {
            Ok(_) => remove_path(&target)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Prune directories left empty, stopping at the work directory
        let mut dir = target.parent();
        while let Some(current) = dir {
            if current == self.workdir || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }

    /// Replace the repository index with the merged index, keeping conflict stages
    fn store_merged_index(&self, merged: &git2::Index) -> Result<()> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        index.clear()?;

        // The stage lives in the entry flags, so conflict entries keep stages 1-3
        for entry in merged.iter() {
            index.add(&entry)?;
        }

        index.write()?;
        Ok(())
    }

    /// Two-tree switch shared by checkout and clean merges
    fn switch_trees(&self, from_tree: &str, to_tree: &str) -> Result<()> {
        let from = self.repo.find_tree(parse_oid(from_tree)?)?;
        let to = self.repo.find_tree(parse_oid(to_tree)?)?;

        if from_tree != to_tree {
            let diff = self.repo.diff_tree_to_tree(Some(&from), Some(&to), None)?;
            for delta in diff.deltas() {
                match delta.status() {
                    Delta::Deleted => {
                        if let Some(path) = delta.old_file().path() {
                            self.remove_entry(path)?;
                        }
                    }
                    _ => {
                        let new_file = delta.new_file();
                        if let Some(path) = new_file.path() {
                            self.write_entry(path, new_file.id(), new_file.mode())?;
                        }
                    }
                }
            }
            debug!("Switched working tree {} -> {}", from_tree, to_tree);
        }

        let mut index = self.repo.index()?;
        index.read_tree(&to)?;
        index.write()?;
        Ok(())
    }
}

impl Worktree for IndexAndWorktree {
    fn checkout(&mut self, from_tree: &str, to_tree: &str) -> Result<()> {
        self.switch_trees(from_tree, to_tree)
    }

    fn merge(&mut self, base: &str, ours: &str, theirs: &str) -> Result<MergeOutcome> {
        let base_tree = self.repo.find_tree(parse_oid(base)?)?;
        let ours_tree = self.repo.find_tree(parse_oid(ours)?)?;
        let theirs_tree = self.repo.find_tree(parse_oid(theirs)?)?;

        let mut merged = self
            .repo
            .merge_trees(&base_tree, &ours_tree, &theirs_tree, None)?;

        if !merged.has_conflicts() {
            let tree = merged.write_tree_to(&self.repo)?.to_string();
            self.switch_trees(ours, &tree)?;
            return Ok(MergeOutcome::Clean(tree));
        }

        let conflicts = conflicted_paths(&merged)?;

        let mut checkout = CheckoutBuilder::new();
        checkout
            .force()
            .allow_conflicts(true)
            .conflict_style_merge(true);
        self.repo
            .checkout_index(Some(&mut merged), Some(&mut checkout))?;

        // Files present in ours but deleted by the merge
        let mut stale = Vec::new();
        ours_tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                let path = format!("{root}{}", entry.name().unwrap_or(""));
                let tracked = (0..=3).any(|stage| merged.get_path(Path::new(&path), stage).is_some());
                if !tracked {
                    stale.push(path);
                }
            }
            TreeWalkResult::Ok
        })?;
        for path in stale {
            self.remove_entry(Path::new(&path))?;
        }

        self.store_merged_index(&merged)?;

        debug!("Merge left {} conflicted path(s)", conflicts.len());
        Ok(MergeOutcome::Conflicted(conflicts))
    }

    fn is_clean(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        Ok(statuses
            .iter()
            .all(|entry| entry.status() == git2::Status::CURRENT))
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(target), path)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    fs::write(path, target)?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
