use super::report_outcome;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::log::{redo_target, undo_target};
use crate::stack::{LogRecord, StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Undo,
    Redo,
}

/// Restore the state recorded `steps` commands back (or forward, for redo).
/// Returns the purpose of the log entry that was restored.
pub fn restore_in(
    repo_path: &Path,
    direction: HistoryDirection,
    steps: usize,
) -> Result<(TransactionOutcome, String)> {
    let mut manager = StackManager::open(repo_path)?;

    let log = &manager.stack().log;
    let (target, record, purpose) = match direction {
        HistoryDirection::Undo => {
            let target = undo_target(log, steps)?;
            (target, LogRecord::undo(target.seq), "undo")
        }
        HistoryDirection::Redo => {
            let target = redo_target(log, steps)?;
            (target, LogRecord::redo(target.seq), "redo")
        }
    };
    let state = target.state.clone();
    let restored = target.purpose.clone();
    manager.check_ready()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, purpose)?.with_log_record(record);
    trans.reset_to_state(&state)?;
    Ok((trans.run(&mut iw)?, restored))
}

pub async fn run_undo(number: usize) -> Result<()> {
    let repo_root = current_repository_root()?;
    let (outcome, restored) = restore_in(&repo_root, HistoryDirection::Undo, number)?;
    report_outcome(outcome)?;
    Output::success(format!("Restored the stack as of '{restored}'"));
    Ok(())
}

pub async fn run_redo(number: usize) -> Result<()> {
    let repo_root = current_repository_root()?;
    let (outcome, restored) = restore_in(&repo_root, HistoryDirection::Redo, number)?;
    report_outcome(outcome)?;
    Output::success(format!("Redid '{restored}'"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::commit::commit_in;
    use crate::cli::commands::test_support::*;
    use crate::stack::PatchSelection;

    #[test]
    fn test_undo_then_redo_commit() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &["p1", "p2"]);
        let before = StackManager::open(&repo_path).unwrap().stack().state.clone();

        commit_in(&repo_path, PatchSelection::Default).unwrap();
        let after = StackManager::open(&repo_path).unwrap().stack().state.clone();

        let (_, restored) = restore_in(&repo_path, HistoryDirection::Undo, 1).unwrap();
        assert_eq!(restored, "new");
        let manager = StackManager::open(&repo_path).unwrap();
        assert_eq!(manager.stack().base(), before.base);
        assert_eq!(manager.stack().state.order, before.order);
        assert_eq!(
            manager.stack().state.patch_commit("p1"),
            before.patch_commit("p1")
        );
        manager.validate().unwrap();
        drop(manager);

        restore_in(&repo_path, HistoryDirection::Redo, 1).unwrap();
        let manager = StackManager::open(&repo_path).unwrap();
        assert_eq!(manager.stack().base(), after.base);
        assert_eq!(manager.stack().state.order, after.order);
        assert_eq!(git(&repo_path, &["rev-parse", "HEAD"]), manager.stack().top());
    }

    #[test]
    fn test_repeated_undo_walks_back() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &["p1", "p2"]);

        restore_in(&repo_path, HistoryDirection::Undo, 1).unwrap();
        restore_in(&repo_path, HistoryDirection::Undo, 1).unwrap();

        let manager = StackManager::open(&repo_path).unwrap();
        assert!(manager.stack().is_empty());
        assert!(!repo_path.join("p1.txt").exists());
    }

    #[test]
    fn test_undo_refresh_after_gc() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &["p1"]);
        let before = git(&repo_path, &["rev-parse", "HEAD"]);

        std::fs::write(repo_path.join("p1.txt"), "p1 refreshed\n").unwrap();
        git(&repo_path, &["add", "-A"]);
        crate::cli::commands::refresh::refresh_in(&repo_path).unwrap();

        // Only the log still refers to the commit p1 had before the refresh
        git(&repo_path, &["reflog", "expire", "--expire=now", "--all"]);
        git(&repo_path, &["gc", "--quiet", "--prune=now"]);

        restore_in(&repo_path, HistoryDirection::Undo, 1).unwrap();
        let manager = StackManager::open(&repo_path).unwrap();
        assert_eq!(manager.stack().top(), before);
        assert_eq!(
            std::fs::read_to_string(repo_path.join("p1.txt")).unwrap(),
            "p1\n"
        );
    }

    #[test]
    fn test_redo_without_undo() {
        let (_temp_dir, repo_path) = create_test_repo();
        stack_with_patches(&repo_path, &["p1"]);
        let err = restore_in(&repo_path, HistoryDirection::Redo, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The last command was not an undo; nothing to redo"
        );
    }
}
