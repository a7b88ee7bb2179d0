//! A conflicting re-push halts the transaction but keeps its progress.

use patchstack::cli::commands::commit::commit_in;
use patchstack::cli::commands::pop::pop_in;
use patchstack::cli::commands::push::push_in;
use patchstack::cli::commands::refresh::refresh_in;
use patchstack::config::{save_settings, Settings};
use patchstack::git::CommitGraph;
use patchstack::stack::{PatchSelection, TransactionOutcome};
use patchstack::StackError;

#[path = "support/test_helpers.rs"]
mod test_helpers;

use test_helpers::*;

/// Unapplied `u` and applied `a` rewrite the same line of `shared.txt`;
/// `b` on top of `a` is independent
fn repush_conflict_stack(repo_path: &std::path::Path) {
    stack_with_patches(repo_path, &[]);
    add_patch(repo_path, "u", "shared.txt", "u\n");
    pop_in(repo_path, PatchSelection::All).unwrap();
    add_patch(repo_path, "a", "shared.txt", "a\n");
    add_patch(repo_path, "b", "b.txt", "b\n");
}

#[test]
fn test_halted_repush_keeps_fold_and_valid_chain() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    repush_conflict_stack(&repo_path);
    let u = patch_commit(&repo_path, "u");

    let (outcome, report) = commit_in(&repo_path, PatchSelection::Names(names(&["u"]))).unwrap();
    assert_eq!(report.folded, names(&["u"]));
    assert!(report.halted);

    let TransactionOutcome::Halted { reason, conflicts } = outcome.clone() else {
        panic!("expected a halt, got {outcome:?}");
    };
    assert!(reason.contains("'a'"));
    assert_eq!(conflicts, names(&["shared.txt"]));

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, StackError::Halted(_)));
    assert_eq!(err.exit_code(), 3);

    let manager = open(&repo_path);
    let stack = manager.stack();
    assert_eq!(stack.base(), u);
    assert!(!stack.state.patches.contains_key("u"));
    assert_eq!(stack.applied(), names(&["a"]).as_slice());
    assert_eq!(stack.unapplied(), names(&["b"]).as_slice());
    manager.validate().unwrap();
    assert_eq!(git(&repo_path, &["rev-parse", "HEAD"]), stack.top());

    // The markers are left for the user
    let shared = std::fs::read_to_string(repo_path.join("shared.txt")).unwrap();
    assert!(shared.contains("<<<<<<<") && shared.contains(">>>>>>>"));
}

#[test]
fn test_resolve_refresh_and_continue_after_halt() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    repush_conflict_stack(&repo_path);
    let (outcome, _) = commit_in(&repo_path, PatchSelection::Names(names(&["u"]))).unwrap();
    assert!(outcome.is_halted());

    std::fs::write(repo_path.join("shared.txt"), "u and a\n").unwrap();
    git(&repo_path, &["add", "shared.txt"]);
    let (outcome, name) = refresh_in(&repo_path).unwrap();
    assert_eq!(outcome, TransactionOutcome::Completed);
    assert_eq!(name, "a");

    let (outcome, pushed) = push_in(&repo_path, PatchSelection::All).unwrap();
    assert_eq!(outcome, TransactionOutcome::Completed);
    assert_eq!(pushed, names(&["b"]));

    let manager = open(&repo_path);
    assert_eq!(manager.stack().applied(), names(&["a", "b"]).as_slice());
    manager.validate().unwrap();

    let graph = manager.git_repo();
    let a = manager.stack().state.patch_commit("a").unwrap();
    assert_eq!(
        graph.diff(manager.stack().base(), a).unwrap().paths(),
        vec!["shared.txt"]
    );
    assert_eq!(git(&repo_path, &["status", "--porcelain"]), "");
}

#[test]
fn test_halt_without_push_conflicts_leaves_patch_unapplied() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    repush_conflict_stack(&repo_path);

    let mut settings = Settings::default();
    settings.stack.allow_push_conflicts = false;
    save_settings(&repo_path, &settings).unwrap();

    let u = patch_commit(&repo_path, "u");
    let (outcome, _) = commit_in(&repo_path, PatchSelection::Names(names(&["u"]))).unwrap();
    match outcome {
        TransactionOutcome::Halted { reason, conflicts } => {
            assert_eq!(reason, "a does not apply cleanly");
            assert!(conflicts.is_empty());
        }
        other => panic!("expected a halt, got {other:?}"),
    }

    let manager = open(&repo_path);
    assert_eq!(manager.stack().base(), u);
    assert!(manager.stack().applied().is_empty());
    assert_eq!(manager.stack().unapplied(), names(&["a", "b"]).as_slice());
    manager.validate().unwrap();

    // Nothing conflicted was written; the tree shows the new base
    assert_eq!(git(&repo_path, &["status", "--porcelain"]), "");
    assert_eq!(
        std::fs::read_to_string(repo_path.join("shared.txt")).unwrap(),
        "u\n"
    );
}

#[test]
fn test_halt_before_fold_folds_nothing() {
    let (_temp_dir, repo_path) = create_test_git_repo();
    stack_with_patches(&repo_path, &[]);
    add_patch(&repo_path, "a", "shared.txt", "a\n");
    add_patch(&repo_path, "b", "shared.txt", "b\n");
    let base = open(&repo_path).stack().base().to_string();

    let (outcome, report) = commit_in(&repo_path, PatchSelection::Names(names(&["b"]))).unwrap();
    assert!(outcome.is_halted());
    assert!(report.folded.is_empty());

    let manager = open(&repo_path);
    assert_eq!(manager.stack().base(), base);
    assert!(manager.stack().state.patches.contains_key("a"));
    assert!(manager.stack().state.patches.contains_key("b"));
    manager.validate().unwrap();
}
