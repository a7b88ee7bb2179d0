use super::{plural, report_outcome};
use crate::cli::output::Output;
use crate::cli::SelectionArgs;
use crate::errors::Result;
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::{PatchSelection, StackManager, StackTransaction, TransactionOutcome};
use std::path::Path;

/// Push the selected unapplied patches; returns the outcome and the names
/// pushed before any halt
pub fn push_in(
    repo_path: &Path,
    selection: PatchSelection,
) -> Result<(TransactionOutcome, Vec<String>)> {
    let mut manager = StackManager::open(repo_path)?;
    let patches = selection.resolve_for_push(&manager.stack().state.order)?;
    manager.check_ready()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "push")?;
    let mut pushed = Vec::new();
    for name in &patches {
        if trans.push_patch(name, &mut iw)?.is_halted() {
            break;
        }
        pushed.push(name.clone());
    }
    Ok((trans.run(&mut iw)?, pushed))
}

pub async fn run(args: SelectionArgs) -> Result<()> {
    let repo_root = current_repository_root()?;
    let selection = PatchSelection::from_args(args.names, args.number, args.all)?;
    let (outcome, pushed) = push_in(&repo_root, selection)?;

    if !pushed.is_empty() {
        Output::success(format!("Pushed {}", plural(pushed.len(), "patch")));
        for name in &pushed {
            Output::sub_item(name);
        }
    }
    report_outcome(outcome)
}
