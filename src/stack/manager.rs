use super::log::{self, LogRecord};
use super::{Stack, StackState};
use crate::config::{ensure_config_dir, get_repo_config_dir, load_settings, Settings};
use crate::errors::{Result, StackError};
use crate::git::{CommitGraph, GitRepository, Worktree};
use crate::utils::file_locking::FileLock;
use crate::utils::path_validation::sanitize_filename;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Owns one branch's stack record for the lifetime of a command.
///
/// The record's lock file is held from `open` until the manager is dropped,
/// so every transaction begun on it finalizes under the lock.
pub struct StackManager {
    /// Git repository interface
    repo: GitRepository,
    /// Path to the repository root
    repo_path: PathBuf,
    /// Path to this branch's stack record
    stack_file: PathBuf,
    /// In-memory copy of the record
    stack: Stack,
    settings: Settings,
    lock: FileLock,
}

impl StackManager {
    /// Open the stack of the currently checked out branch
    pub fn open(repo_path: &Path) -> Result<Self> {
        let (repo, settings, branch) = Self::open_repo(repo_path)?;
        let stack_file = Self::stack_file_for(repo_path, &branch)?;
        let lock = FileLock::acquire(&stack_file)?;

        if !stack_file.exists() {
            return Err(StackError::not_initialized(format!(
                "Branch '{branch}' has no patch stack. Run 'pstk init' first"
            )));
        }
        let stack = Self::load_from_disk(&stack_file)?;
        debug!(
            "Loaded stack '{}' with {} applied and {} unapplied patches",
            stack.name,
            stack.applied().len(),
            stack.unapplied().len()
        );

        Ok(Self {
            repo,
            repo_path: repo_path.to_path_buf(),
            stack_file,
            stack,
            settings,
            lock,
        })
    }

    /// Create an empty stack on the current branch, based at its head
    pub fn initialize(repo_path: &Path, force: bool) -> Result<Self> {
        let (repo, settings, branch) = Self::open_repo(repo_path)?;
        let stack_file = Self::stack_file_for(repo_path, &branch)?;
        let lock = FileLock::acquire(&stack_file)?;

        if stack_file.exists() {
            if !force {
                return Err(StackError::validation(format!(
                    "Branch '{branch}' already has a patch stack (use --force to reinitialize)"
                )));
            }
            // Patches of the old record are dropped together with their refs
            if let Ok(old) = Self::load_from_disk(&stack_file) {
                for name in old.state.patches.keys() {
                    repo.delete_patch_ref(&branch, name)?;
                }
            }
        }

        let head = repo.get_branch_head(&branch)?;
        let mut stack = Stack::new(branch.clone(), head.clone());
        log::append(
            &mut stack.log,
            "init",
            LogRecord::command(),
            stack.state.clone(),
            settings.stack.max_log_entries,
        );

        let manager = Self {
            repo,
            repo_path: repo_path.to_path_buf(),
            stack_file,
            stack,
            settings,
            lock,
        };
        manager.save_to_disk()?;
        manager.keep_log_commits()?;

        info!("Initialized patch stack on '{}' at {}", branch, head);
        Ok(manager)
    }

    fn open_repo(repo_path: &Path) -> Result<(GitRepository, Settings, String)> {
        let settings = load_settings(repo_path)?;
        let repo = GitRepository::open(repo_path)?.with_identity(
            settings.git.author_name.clone(),
            settings.git.author_email.clone(),
        );
        let branch = repo.get_current_branch()?;
        Ok((repo, settings, branch))
    }

    fn stack_file_for(repo_path: &Path, branch: &str) -> Result<PathBuf> {
        let config_dir = get_repo_config_dir(repo_path)?;
        ensure_config_dir(&config_dir)?;
        Ok(config_dir
            .join("stacks")
            .join(format!("{}.json", sanitize_filename(branch))))
    }

    /// Whether the current branch has a stack record
    pub fn is_initialized(repo_path: &Path) -> Result<bool> {
        let (_, _, branch) = Self::open_repo(repo_path)?;
        Ok(Self::stack_file_for(repo_path, &branch)?.exists())
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Branch the stack is bound to
    pub fn branch(&self) -> &str {
        &self.stack.name
    }

    pub fn git_repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stack_file(&self) -> &Path {
        &self.stack_file
    }

    pub fn lock_path(&self) -> &Path {
        self.lock.lock_path()
    }

    /// Replace the stack state with one atomic write and record it in the log
    pub fn commit_state(
        &mut self,
        purpose: &str,
        state: StackState,
        record: LogRecord,
    ) -> Result<u64> {
        state.validate().map_err(|e| {
            StackError::corruption(format!("Refusing to write invalid stack state: {e}"))
        })?;

        let mut updated = self.stack.clone();
        let seq = log::append(
            &mut updated.log,
            purpose,
            record,
            state.clone(),
            self.settings.stack.max_log_entries,
        );
        updated.state = state;
        updated.updated_at = Utc::now();

        crate::utils::atomic_file::write_json_unlocked(&self.stack_file, &updated)?;
        self.stack = updated;
        self.keep_log_commits()?;

        debug!("Wrote stack state #{} ({})", seq, purpose);
        Ok(seq)
    }

    /// Fail when the branch was moved outside of patchstack
    pub fn check_head_top_mismatch(&self) -> Result<()> {
        let head = self.repo.get_branch_head(self.branch())?;
        let top = self.stack.top();

        if head != top {
            return Err(StackError::validation(format!(
                "Branch '{}' is at {} but the stack top is {}; \
                 HEAD was changed outside patchstack (see 'pstk validate --repair')",
                self.branch(),
                &head[..head.len().min(8)],
                &top[..top.len().min(8)]
            )));
        }
        Ok(())
    }

    /// Move the branch to the recorded top after a finalize that stopped
    /// between writing the record and moving the branch.
    ///
    /// Only done when the branch still points at the top of the previous log
    /// entry. Returns whether anything was repaired.
    pub fn repair_branch_head(&self, iw: &mut dyn Worktree) -> Result<bool> {
        let head = self.repo.get_branch_head(self.branch())?;
        let top = self.stack.top();
        if head == top {
            return Ok(false);
        }

        let previous_top = self.stack.log.iter().rev().nth(1).map(|e| e.state.top());
        if previous_top != Some(head.as_str()) {
            return Err(StackError::validation(format!(
                "Branch '{}' at {} matches neither the stack top nor the state before it; \
                 move it back with 'git reset' or run 'pstk init --force'",
                self.branch(),
                &head[..head.len().min(8)]
            )));
        }

        let from_tree = self.repo.resolve(&head)?.tree;
        let to_tree = self.repo.resolve(top)?.tree;
        self.repo
            .set_branch_head(self.branch(), top, "patchstack: repair branch head")?;
        iw.checkout(&from_tree, &to_tree)?;

        warn!(
            "Moved '{}' from {} to the recorded stack top {}",
            self.branch(),
            head,
            top
        );
        Ok(true)
    }

    /// Refuse to start when tracked files have local modifications
    pub fn check_clean_worktree(&self) -> Result<()> {
        if self.settings.stack.require_clean_worktree && self.repo.is_dirty()? {
            return Err(StackError::validation(
                "Working tree has local changes; commit or stash them first",
            ));
        }
        Ok(())
    }

    /// Checks every precondition a mutating command needs
    pub fn check_ready(&self) -> Result<()> {
        self.check_clean_worktree()?;
        self.check_head_top_mismatch()
    }

    /// Check the record structure and the commit chain it describes
    pub fn validate(&self) -> Result<()> {
        let state = &self.stack.state;

        state.validate().map_err(|e| {
            StackError::corruption(format!("Stack '{}' validation failed: {e}", self.branch()))
        })?;

        state.validate_chain(&self.repo).map_err(|e| {
            StackError::corruption(format!(
                "Stack '{}' Git integrity validation failed: {e}",
                self.branch()
            ))
        })?;

        for name in state.patches.keys() {
            if self.repo.get_patch_ref(self.branch(), name).is_none() {
                return Err(StackError::corruption(format!(
                    "Patch '{name}' has no ref under refs/patches/{}",
                    self.branch()
                )));
            }
        }

        Ok(())
    }

    /// Hold a ref on every commit the log refers to, so undo and redo can
    /// still resolve them after `git gc`
    fn keep_log_commits(&self) -> Result<()> {
        let commits: BTreeSet<String> = self
            .stack
            .log
            .iter()
            .flat_map(|entry| {
                std::iter::once(entry.state.base.clone())
                    .chain(entry.state.patches.values().map(|p| p.commit.clone()))
            })
            .collect();
        self.repo.sync_keep_refs(self.branch(), &commits)
    }

    fn save_to_disk(&self) -> Result<()> {
        crate::utils::atomic_file::write_json_unlocked(&self.stack_file, &self.stack)
    }

    fn load_from_disk(stack_file: &Path) -> Result<Stack> {
        let content = fs::read_to_string(stack_file)
            .map_err(|e| StackError::config(format!("Failed to read stack file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| StackError::corruption(format!("Failed to parse stack file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::IndexAndWorktree;
    use crate::stack::{LogKind, PatchRecord};
    use std::process::Command;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        // Initialize git repository
        Command::new("git")
            .args(["init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        // Create an initial commit
        std::fs::write(repo_path.join("README.md"), "# Test Repo").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        Command::new("git")
            .args(["commit", "-m", "Initial commit"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (temp_dir, repo_path)
    }

    #[test]
    fn test_open_requires_init() {
        let (_temp_dir, repo_path) = create_test_repo();

        let err = StackManager::open(&repo_path).err().unwrap();
        assert!(err.to_string().contains("pstk init"));
        assert!(!StackManager::is_initialized(&repo_path).unwrap());
    }

    #[test]
    fn test_initialize_uses_branch_head_as_base() {
        let (_temp_dir, repo_path) = create_test_repo();
        let head = GitRepository::open(&repo_path)
            .unwrap()
            .get_head_commit_hash()
            .unwrap();

        let manager = StackManager::initialize(&repo_path, false).unwrap();
        assert_eq!(manager.stack().base(), head);
        assert!(manager.stack().is_empty());
        assert_eq!(manager.stack().log.len(), 1);
        assert!(manager.stack_file().exists());
        drop(manager);

        assert!(StackManager::is_initialized(&repo_path).unwrap());
        assert!(StackManager::initialize(&repo_path, false).is_err());
        assert!(StackManager::initialize(&repo_path, true).is_ok());
    }

    #[test]
    fn test_lock_held_for_manager_lifetime() {
        let (_temp_dir, repo_path) = create_test_repo();
        let manager = StackManager::initialize(&repo_path, false).unwrap();
        let lock_path = manager.lock_path().to_path_buf();

        assert!(FileLock::try_acquire(&lock_path).is_err());
        drop(manager);
        assert!(!lock_path.exists());

        let reopened = StackManager::open(&repo_path).unwrap();
        assert_eq!(reopened.lock_path(), lock_path);
    }

    #[test]
    fn test_commit_state_persists_and_logs() {
        let (_temp_dir, repo_path) = create_test_repo();
        let mut manager = StackManager::initialize(&repo_path, false).unwrap();

        let mut state = manager.stack().state.clone();
        let base = state.base.clone();
        state
            .patches
            .insert("p1".to_string(), PatchRecord::new(base.clone()));
        state.order.unapplied.push("p1".to_string());

        let seq = manager
            .commit_state("test", state.clone(), LogRecord::command())
            .unwrap();
        assert_eq!(seq, 2);
        drop(manager);

        let manager = StackManager::open(&repo_path).unwrap();
        assert_eq!(manager.stack().state, state);
        assert_eq!(manager.stack().log.last().unwrap().kind, LogKind::Command);
        assert_eq!(manager.stack().log.last().unwrap().purpose, "test");
    }

    #[test]
    fn test_commit_state_rejects_invalid_state() {
        let (_temp_dir, repo_path) = create_test_repo();
        let mut manager = StackManager::initialize(&repo_path, false).unwrap();
        let before = fs::read_to_string(manager.stack_file()).unwrap();

        let mut state = manager.stack().state.clone();
        state.order.applied.push("ghost".to_string());

        assert!(manager
            .commit_state("broken", state, LogRecord::command())
            .is_err());
        assert_eq!(fs::read_to_string(manager.stack_file()).unwrap(), before);
    }

    #[test]
    fn test_head_top_mismatch_detected() {
        let (_temp_dir, repo_path) = create_test_repo();
        let manager = StackManager::initialize(&repo_path, false).unwrap();
        assert!(manager.check_head_top_mismatch().is_ok());

        std::fs::write(repo_path.join("extra.txt"), "extra").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "Outside commit"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let err = manager.check_head_top_mismatch().unwrap_err();
        assert!(err.is_usage());
    }

    fn run_git(repo_path: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed: {output:?}");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Record a one-patch state whose commit the branch never reached
    fn interrupted_finalize(repo_path: &Path) -> (StackManager, String) {
        let mut manager = StackManager::initialize(repo_path, false).unwrap();
        let base = manager.stack().base().to_string();

        std::fs::write(repo_path.join("p1.txt"), "p1\n").unwrap();
        run_git(repo_path, &["add", "-A"]);
        run_git(repo_path, &["commit", "-q", "-m", "Add p1"]);
        let p1 = run_git(repo_path, &["rev-parse", "HEAD"]);
        run_git(repo_path, &["reset", "-q", "--hard", &base]);

        let mut state = manager.stack().state.clone();
        state
            .patches
            .insert("p1".to_string(), PatchRecord::new(p1.clone()));
        state.order.applied.push("p1".to_string());
        manager
            .commit_state("new", state, LogRecord::command())
            .unwrap();
        (manager, p1)
    }

    #[test]
    fn test_repair_moves_branch_to_recorded_top() {
        let (_temp_dir, repo_path) = create_test_repo();
        let (manager, p1) = interrupted_finalize(&repo_path);
        assert!(manager.check_head_top_mismatch().is_err());

        let mut iw = IndexAndWorktree::open(&repo_path).unwrap();
        assert!(manager.repair_branch_head(&mut iw).unwrap());

        manager.check_head_top_mismatch().unwrap();
        assert_eq!(run_git(&repo_path, &["rev-parse", "HEAD"]), p1);
        assert_eq!(
            fs::read_to_string(repo_path.join("p1.txt")).unwrap(),
            "p1\n"
        );
        assert!(iw.is_clean().unwrap());
        assert!(!manager.repair_branch_head(&mut iw).unwrap());
    }

    #[test]
    fn test_repair_refuses_unrelated_head() {
        let (_temp_dir, repo_path) = create_test_repo();
        let (manager, _) = interrupted_finalize(&repo_path);

        std::fs::write(repo_path.join("other.txt"), "other\n").unwrap();
        run_git(&repo_path, &["add", "-A"]);
        run_git(&repo_path, &["commit", "-q", "-m", "Outside commit"]);

        let mut iw = IndexAndWorktree::open(&repo_path).unwrap();
        let err = manager.repair_branch_head(&mut iw).unwrap_err();
        assert!(err.is_usage());
        assert!(manager.check_head_top_mismatch().is_err());
    }

    #[test]
    fn test_log_commits_are_kept_alive() {
        let (_temp_dir, repo_path) = create_test_repo();
        let (manager, p1) = interrupted_finalize(&repo_path);

        let kept = manager.git_repo().keep_refs(manager.branch()).unwrap();
        assert!(kept.contains(&p1));
        assert!(kept.contains(manager.stack().base()));
    }
}
