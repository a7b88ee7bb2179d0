use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{current_repository_root, GitRepository, IndexAndWorktree};
use crate::stack::StackManager;
use std::path::Path;

/// Check the stack record, its commit chain and the patch refs.
///
/// With `repair`, a branch left one command behind the record is moved to
/// the recorded top first. Returns whether that happened.
pub fn validate_in(repo_path: &Path, repair: bool) -> Result<bool> {
    let manager = StackManager::open(repo_path)?;
    let repaired = if repair {
        let mut iw = IndexAndWorktree::open(repo_path)?;
        manager.repair_branch_head(&mut iw)?
    } else {
        false
    };

    manager.validate()?;
    manager.check_head_top_mismatch()?;
    Ok(repaired)
}

pub async fn run(repair: bool) -> Result<()> {
    let repo_root = current_repository_root()?;
    if validate_in(&repo_root, repair)? {
        Output::info("Moved the branch to the recorded stack top");
    }

    let info = GitRepository::open(&repo_root)?.get_info()?;
    Output::success(format!(
        "Stack on '{}' is consistent with the repository",
        info.head_branch.unwrap_or_default()
    ));
    if info.is_dirty {
        Output::warning("Working tree has local changes");
    }
    Ok(())
}
