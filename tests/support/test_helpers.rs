//! Repository fixtures shared by the integration tests.

#![allow(dead_code)]

use patchstack::cli::commands::{init::init_in, new::new_in};
use patchstack::stack::StackManager;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `repo_path` and return trimmed stdout
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed: {output:?}");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create test git repository with two commits; `shared.txt` holds "one"
pub fn create_test_git_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    let git_commands = [
        vec!["init"],
        vec!["config", "user.name", "Test User"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "core.autocrlf", "false"],
    ];
    for cmd_args in &git_commands {
        git(&repo_path, cmd_args);
    }

    std::fs::write(repo_path.join("README.md"), "# Test Repo\n").unwrap();
    git(&repo_path, &["add", "."]);
    git(&repo_path, &["commit", "-q", "-m", "Initial commit"]);

    std::fs::write(repo_path.join("shared.txt"), "one\n").unwrap();
    git(&repo_path, &["add", "."]);
    git(&repo_path, &["commit", "-q", "-m", "Add shared file"]);

    (temp_dir, repo_path)
}

/// Write `file`, stage everything and record it as patch `name`
pub fn add_patch(repo_path: &Path, name: &str, file: &str, content: &str) {
    std::fs::write(repo_path.join(file), content).unwrap();
    git(repo_path, &["add", "-A"]);
    new_in(repo_path, name, Some(format!("Add {name}"))).unwrap();

    let changed = git(
        repo_path,
        &["diff-tree", "--no-commit-id", "--name-only", "-r", "HEAD"],
    );
    assert_eq!(changed, file, "patch {name} does not record its change");
}

/// Initialized stack with one patch per name, each adding `<name>.txt`
pub fn stack_with_patches(repo_path: &Path, names: &[&str]) {
    init_in(repo_path, false).unwrap();
    for name in names {
        add_patch(repo_path, name, &format!("{name}.txt"), &format!("{name}\n"));
    }
}

pub fn open(repo_path: &Path) -> StackManager {
    StackManager::open(repo_path).unwrap()
}

pub fn patch_commit(repo_path: &Path, name: &str) -> String {
    open(repo_path)
        .stack()
        .state
        .patch_commit(name)
        .unwrap()
        .to_string()
}

pub fn stack_file_contents(repo_path: &Path) -> String {
    let manager = open(repo_path);
    std::fs::read_to_string(manager.stack_file()).unwrap()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
