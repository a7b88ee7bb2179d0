use super::{plural, report_outcome};
use crate::cli::output::Output;
use crate::cli::SelectionArgs;
use crate::errors::Result;
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::{
    commit_to_base, FoldReport, PatchSelection, StackManager, StackTransaction, TransactionOutcome,
};
use std::path::Path;

/// Fold the selected patches into the base.
///
/// Selection errors are raised before the stack is touched. A halt still
/// persists whatever the transaction got done.
pub fn commit_in(
    repo_path: &Path,
    selection: PatchSelection,
) -> Result<(TransactionOutcome, FoldReport)> {
    let mut manager = StackManager::open(repo_path)?;
    let patches = selection.resolve_for_commit(&manager.stack().state.order)?;
    manager.check_ready()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "commit")?;
    let report = commit_to_base(&mut trans, &patches, &mut iw)?;
    Ok((trans.run(&mut iw)?, report))
}

pub async fn run(args: SelectionArgs) -> Result<()> {
    let repo_root = current_repository_root()?;
    let selection = PatchSelection::from_args(args.names, args.number, args.all)?;
    let (outcome, report) = commit_in(&repo_root, selection)?;

    if !report.folded.is_empty() {
        Output::success(format!("Committed {}", plural(report.folded.len(), "patch")));
    }
    report_outcome(outcome)
}
