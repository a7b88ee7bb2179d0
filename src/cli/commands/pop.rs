use super::{plural, report_outcome};
use crate::cli::output::Output;
use crate::cli::SelectionArgs;
use crate::errors::Result;
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::{PatchSelection, StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

/// Pop the selected applied patches.
///
/// Everything above the lowest selected patch comes off; patches that were
/// not selected are pushed back in their original order.
pub fn pop_in(
    repo_path: &Path,
    selection: PatchSelection,
) -> Result<(TransactionOutcome, Vec<String>)> {
    let mut manager = StackManager::open(repo_path)?;
    let selected = selection.resolve_for_pop(&manager.stack().state.order)?;
    manager.check_ready()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "pop")?;
    let popped = trans.pop_patches(|name| selected.iter().any(|s| s == name));

    let keep: Vec<String> = popped
        .iter()
        .rev()
        .filter(|name| !selected.contains(name))
        .cloned()
        .collect();
    let _ = trans.push_patches(&keep, &mut iw)?;

    Ok((trans.run(&mut iw)?, selected))
}

pub async fn run(args: SelectionArgs) -> Result<()> {
    let repo_root = current_repository_root()?;
    let selection = PatchSelection::from_args(args.names, args.number, args.all)?;
    let (outcome, popped) = pop_in(&repo_root, selection)?;

    if !outcome.is_halted() {
        Output::success(format!("Popped {}", plural(popped.len(), "patch")));
    }
    report_outcome(outcome)
}
