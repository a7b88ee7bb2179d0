use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{current_repository_root, CommitGraph, GitRepository};
use crate::stack::StackManager;
use std::path::Path;

/// One line of `pstk series`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLine {
    /// `>` top, `+` applied, `-` unapplied
    pub marker: char,
    pub name: String,
    pub summary: Option<String>,
}

pub fn series_in(repo_path: &Path, description: bool) -> Result<Vec<SeriesLine>> {
    let manager = StackManager::open(repo_path)?;
    let stack = manager.stack();
    let top = stack.applied().last();

    let mut lines = Vec::with_capacity(stack.len());
    for (name, applied) in stack
        .applied()
        .iter()
        .map(|n| (n, true))
        .chain(stack.unapplied().iter().map(|n| (n, false)))
    {
        let marker = match (applied, Some(name) == top) {
            (true, true) => '>',
            (true, false) => '+',
            _ => '-',
        };

        let summary = match (description, stack.state.patch_commit(name)) {
            (true, Some(commit)) => Some(
                manager
                    .git_repo()
                    .resolve(commit)?
                    .summary()
                    .to_string(),
            ),
            _ => None,
        };

        lines.push(SeriesLine {
            marker,
            name: name.clone(),
            summary,
        });
    }
    Ok(lines)
}

pub async fn run(description: bool) -> Result<()> {
    let repo_root = current_repository_root()?;
    let lines = series_in(&repo_root, description)?;

    if lines.is_empty() {
        Output::info("No patches in the stack");
        return Ok(());
    }
    for line in &lines {
        Output::patch_line(line.marker, &line.name, line.summary.as_deref());
    }

    let conflicts = GitRepository::open(&repo_root)?.get_conflicted_files()?;
    if !conflicts.is_empty() {
        Output::halted("Unresolved conflicts in the working tree", &conflicts);
    }
    Ok(())
}
