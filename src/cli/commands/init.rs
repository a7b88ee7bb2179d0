use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::current_repository_root;
use crate::stack::StackManager;
use std::path::Path;

/// Create a stack on the checked out branch; returns the base commit
pub fn init_in(repo_path: &Path, force: bool) -> Result<String> {
    if force && StackManager::is_initialized(repo_path)? {
        tracing::warn!("Force reinitializing the patch stack...");
    }
    let manager = StackManager::initialize(repo_path, force)?;
    Ok(manager.stack().base().to_string())
}

/// Initialize a patch stack for the current branch
pub async fn run(force: bool) -> Result<()> {
    let repo_root = current_repository_root()?;
    tracing::debug!("Found Git repository at: {}", repo_root.display());

    let base = init_in(&repo_root, force)?;

    Output::success(format!(
        "Patch stack initialized at {}",
        &base[..base.len().min(8)]
    ));
    Output::next_steps(&[
        "Stage a change and record it: pstk new <name> -m \"message\"",
        "List the stack: pstk series",
    ]);
    Ok(())
}
