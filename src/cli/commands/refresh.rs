use super::report_outcome;
use crate::cli::output::Output;
use crate::errors::{Result, StackError};
use crate::git::{current_repository_root, CommitGraph, IndexAndWorktree};
use crate::stack::{StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

/// Replace the top patch with the staged tree; returns the patch name.
///
/// This is also how a halted push is finished: resolve the conflicts,
/// stage the files and refresh.
pub fn refresh_in(repo_path: &Path) -> Result<(TransactionOutcome, String)> {
    let mut manager = StackManager::open(repo_path)?;
    manager.check_head_top_mismatch()?;

    let name = manager
        .stack()
        .applied()
        .last()
        .cloned()
        .ok_or_else(|| StackError::validation("No patches applied"))?;

    let repo = manager.git_repo();
    let tree = repo.index_tree()?;
    let top = repo.resolve(manager.stack().top())?;
    let parents: Vec<&str> = top.parents.iter().map(String::as_str).collect();
    let commit = repo.create_commit(&tree, &parents, &top.data())?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "refresh")?;
    trans.refresh_top(&commit)?;
    Ok((trans.run(&mut iw)?, name))
}

pub async fn run() -> Result<()> {
    let repo_root = current_repository_root()?;
    let (outcome, name) = refresh_in(&repo_root)?;
    report_outcome(outcome)?;
    Output::success(format!("Refreshed patch '{name}'"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::test_support::*;

    #[test]
    fn test_refresh_folds_staged_changes_into_top() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &["p1", "p2"]);
        let old_top = StackManager::open(&repo_path).unwrap().stack().top().to_string();

        std::fs::write(repo_path.join("p2.txt"), "p2 updated\n").unwrap();
        git(&repo_path, &["add", "p2.txt"]);
        let (outcome, name) = refresh_in(&repo_path).unwrap();
        assert_eq!(outcome, TransactionOutcome::Completed);
        assert_eq!(name, "p2");

        let manager = StackManager::open(&repo_path).unwrap();
        assert_ne!(manager.stack().top(), old_top);
        assert_eq!(
            git(&repo_path, &["show", "HEAD:p2.txt"]),
            "p2 updated"
        );
        assert_eq!(git(&repo_path, &["log", "-1", "--format=%s"]), "p2");
        assert_eq!(git(&repo_path, &["status", "--porcelain"]), "");
        manager.validate().unwrap();
    }

    #[test]
    fn test_refresh_with_nothing_applied() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &[]);
        assert_eq!(
            refresh_in(&repo_path).unwrap_err().to_string(),
            "No patches applied"
        );
    }
}
