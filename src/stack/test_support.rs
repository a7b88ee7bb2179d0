//! Repository fixtures shared by the stack unit tests.

use super::{StackManager, StackTransaction, TransactionOutcome};
use crate::config::{save_settings, Settings};
use crate::git::{CommitData, CommitGraph, IndexAndWorktree, Worktree};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub fn git(repo_path: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed: {output:?}");
}

/// A repository with two commits; `shared.txt` holds "one"
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    git(&repo_path, &["init"]);
    git(&repo_path, &["config", "user.name", "Test User"]);
    git(&repo_path, &["config", "user.email", "test@example.com"]);

    std::fs::write(repo_path.join("README.md"), "# Test Repo\n").unwrap();
    git(&repo_path, &["add", "."]);
    git(&repo_path, &["commit", "-m", "Initial commit"]);

    std::fs::write(repo_path.join("shared.txt"), "one\n").unwrap();
    git(&repo_path, &["add", "."]);
    git(&repo_path, &["commit", "-m", "Add shared file"]);

    (temp_dir, repo_path)
}

/// Write a file, stage it and record the result as a new top patch
pub fn add_patch(manager: &mut StackManager, name: &str, file: &str, content: &str) {
    let repo_path = manager.repo_path().to_path_buf();
    std::fs::write(repo_path.join(file), content).unwrap();
    git(&repo_path, &["add", "-A"]);

    let repo = manager.git_repo();
    let tree = repo.index_tree().unwrap();
    let top = manager.stack().top().to_string();
    let commit = repo
        .create_commit(&tree, &[&top], &CommitData::new(format!("Add {name}\n")))
        .unwrap();
    assert_eq!(
        repo.diff(&top, &commit).unwrap().paths(),
        vec![file],
        "patch {name} does not record its change"
    );

    let mut iw = IndexAndWorktree::open(&repo_path).unwrap();
    let mut trans = StackTransaction::begin(manager, "new").unwrap();
    trans.new_patch(name, &commit).unwrap();
    assert_eq!(trans.run(&mut iw).unwrap(), TransactionOutcome::Completed);
}

pub fn pop_all(manager: &mut StackManager) {
    let mut iw = IndexAndWorktree::open(manager.repo_path()).unwrap();
    let mut trans = StackTransaction::begin(manager, "pop").unwrap();
    let _ = trans.pop_patches(|_| true);
    assert_eq!(trans.run(&mut iw).unwrap(), TransactionOutcome::Completed);
}

/// Initialized stack with one patch per name, each adding `<name>.txt`
pub fn stack_with_patches(repo_path: &Path, names: &[&str]) -> StackManager {
    let mut manager = StackManager::initialize(repo_path, false).unwrap();
    for name in names {
        add_patch(&mut manager, name, &format!("{name}.txt"), &format!("{name}\n"));
    }
    manager
}

/// Patches a and b both rewrite the line in `shared.txt`; b is on top of a
pub fn conflicting_stack(repo_path: &Path) -> StackManager {
    let mut manager = StackManager::initialize(repo_path, false).unwrap();
    add_patch(&mut manager, "a", "shared.txt", "a\n");
    add_patch(&mut manager, "b", "shared.txt", "b\n");
    manager
}

/// Unapplied u and applied a edit the same line; b is independent
pub fn repush_conflict_stack(repo_path: &Path) -> StackManager {
    let mut manager = StackManager::initialize(repo_path, false).unwrap();
    add_patch(&mut manager, "u", "shared.txt", "u\n");
    pop_all(&mut manager);
    add_patch(&mut manager, "a", "shared.txt", "a\n");
    add_patch(&mut manager, "b", "b.txt", "b\n");
    manager
}

pub fn set_allow_push_conflicts(repo_path: &Path, allow: bool) {
    let mut settings = Settings::default();
    settings.stack.allow_push_conflicts = allow;
    save_settings(repo_path, &settings).unwrap();
}

pub fn assert_worktree_matches_top(manager: &StackManager) {
    manager.check_head_top_mismatch().unwrap();
    let iw = IndexAndWorktree::open(manager.repo_path()).unwrap();
    assert!(iw.is_clean().unwrap(), "working tree does not match the top");
}
