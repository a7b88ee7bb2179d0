use super::report_outcome;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{current_repository_root, CommitData, CommitGraph, IndexAndWorktree};
use crate::stack::{StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

/// Record the staged changes as a new patch on top of the stack
pub fn new_in(repo_path: &Path, name: &str, message: Option<String>) -> Result<TransactionOutcome> {
    let mut manager = StackManager::open(repo_path)?;
    manager.check_head_top_mismatch()?;

    let repo = manager.git_repo();
    let tree = repo.index_tree()?;
    let top = manager.stack().top().to_string();
    let message = message.unwrap_or_else(|| name.to_string());
    let commit = repo.create_commit(&tree, &[&top], &CommitData::new(message))?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "new")?;
    trans.new_patch(name, &commit)?;
    trans.run(&mut iw)
}

pub async fn run(name: String, message: Option<String>) -> Result<()> {
    let repo_root = current_repository_root()?;
    let outcome = new_in(&repo_root, &name, message)?;
    report_outcome(outcome)?;
    Output::success(format!("Now at patch '{name}'"));
    Ok(())
}
