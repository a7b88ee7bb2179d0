use super::{plural, report_outcome};
use crate::cli::output::Output;
use crate::errors::{Result, StackError};
use crate::git::{current_repository_root, IndexAndWorktree};
use crate::stack::{StackManager, StackTransaction, TransactionOutcome};
use crate::utils::patch_names::{patch_name_from_message, unique_patch_name};
use std::path::Path;

/// Turn the `number` commits below the base into patches, named after their
/// subject lines. Returns the new names, bottom first.
pub fn uncommit_in(
    repo_path: &Path,
    number: usize,
) -> Result<(TransactionOutcome, Vec<String>)> {
    if number == 0 {
        return Err(StackError::validation("Bad number of commits to uncommit"));
    }

    let mut manager = StackManager::open(repo_path)?;
    manager.check_head_top_mismatch()?;

    let mut iw = IndexAndWorktree::open(repo_path)?;
    let mut trans = StackTransaction::begin(&mut manager, "uncommit")?;
    let mut created = Vec::with_capacity(number);

    for _ in 0..number {
        let info = trans.graph().resolve(trans.base())?;
        let name = unique_patch_name(&patch_name_from_message(&info.message), |candidate| {
            trans.applied().iter().any(|n| n == candidate)
                || trans.unapplied().iter().any(|n| n == candidate)
        });
        trans.uncommit(&name)?;
        created.insert(0, name);
    }

    Ok((trans.run(&mut iw)?, created))
}

pub async fn run(number: usize) -> Result<()> {
    let repo_root = current_repository_root()?;
    let (outcome, created) = uncommit_in(&repo_root, number)?;

    Output::success(format!("Uncommitted {}", plural(created.len(), "patch")));
    for name in &created {
        Output::sub_item(name);
    }
    report_outcome(outcome)
}
