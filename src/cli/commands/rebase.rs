use super::report_outcome;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::{StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

/// Move the stack base to `revision` and push the applied patches back
pub fn rebase_in(repo_path: &Path, revision: &str) -> Result<TransactionOutcome> {
    let mut manager = StackManager::open(repo_path)?;
    let target = manager.git_repo().resolve_revision(revision)?;
    manager.check_ready()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "rebase")?;
    let applied = trans.applied().to_vec();
    let _ = trans.pop_patches(|_| true);
    trans.set_base(&target)?;
    let _ = trans.push_patches(&applied, &mut iw)?;
    trans.run(&mut iw)
}

pub async fn run(revision: String) -> Result<()> {
    let repo_root = current_repository_root()?;
    let outcome = rebase_in(&repo_root, &revision)?;
    report_outcome(outcome)?;
    Output::success(format!("Rebased the stack onto {revision}"));
    Ok(())
}
