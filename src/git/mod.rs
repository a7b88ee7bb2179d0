pub mod graph;
pub mod repository;
pub mod worktree;

pub use graph::{
    Author, ChangeKind, ChangeSet, CommitData, CommitGraph, CommitInfo, FileChange, TreeMerge,
};
pub use repository::{patch_ref_name, GitRepository, RepositoryInfo};
pub use worktree::{IndexAndWorktree, MergeOutcome, Worktree};

use crate::errors::{Result, StackError};
use std::path::{Path, PathBuf};

/// Resolve the per-worktree git directory from a workdir path.
/// Handles both normal repos (.git is a directory) and worktrees (.git is a file
/// containing `gitdir: <path>`).
pub fn resolve_git_dir(workdir: &Path) -> Result<PathBuf> {
    let git_path = workdir.join(".git");
    if git_path.is_dir() {
        Ok(git_path)
    } else if git_path.is_file() {
        let content = std::fs::read_to_string(&git_path)
            .map_err(|e| StackError::config(format!("Failed to read .git file: {e}")))?;
        let gitdir = content
            .strip_prefix("gitdir: ")
            .map(|s| s.trim())
            .ok_or_else(|| StackError::config("Invalid .git file format"))?;
        let resolved = if std::path::Path::new(gitdir).is_absolute() {
            PathBuf::from(gitdir)
        } else {
            workdir.join(gitdir)
        };
        Ok(resolved)
    } else {
        Err(StackError::config(format!(
            "Not a git repository: {}",
            git_path.display()
        )))
    }
}

/// Check if a directory is a Git repository
pub fn is_git_repository(path: &Path) -> bool {
    path.join(".git").exists() || git2::Repository::discover(path).is_ok()
}

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<std::path::PathBuf> {
    let repo = git2::Repository::discover(start_path).map_err(StackError::Git)?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| StackError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}

/// Root of the repository containing the current directory
pub fn current_repository_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()
        .map_err(|e| StackError::config(format!("Could not get current directory: {e}")))?;

    if !is_git_repository(&current_dir) {
        return Err(StackError::not_initialized(
            "Not in a Git repository. Please run this command from within a Git repository.",
        ));
    }

    find_repository_root(&current_dir)
}
