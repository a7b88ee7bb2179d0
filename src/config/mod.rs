pub mod settings;

pub use settings::{GitConfig, Settings, StackSettings};

use crate::errors::{Result, StackError};
use crate::git::resolve_git_dir;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the user-level configuration directory (~/.patchstack/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| StackError::config("Could not find home directory"))?;
    Ok(home_dir.join(".patchstack"))
}

/// Get the patchstack directory inside a repository's git directory
pub fn get_repo_config_dir(repo_path: &Path) -> Result<PathBuf> {
    Ok(resolve_git_dir(repo_path)?.join("patchstack"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    let stacks_dir = config_dir.join("stacks");
    if !stacks_dir.exists() {
        fs::create_dir_all(&stacks_dir).map_err(|e| {
            StackError::config(format!("Failed to create stacks directory: {e}"))
        })?;
    }

    Ok(())
}

/// Load settings for a repository: repo file, then user file, then defaults
pub fn load_settings(repo_path: &Path) -> Result<Settings> {
    let repo_file = get_repo_config_dir(repo_path)?.join("config.json");
    if repo_file.exists() {
        return Settings::load_from_file(&repo_file);
    }

    if let Ok(user_dir) = get_config_dir() {
        let user_file = user_dir.join("config.json");
        if user_file.exists() {
            tracing::debug!("Using user settings from {}", user_file.display());
            return Settings::load_from_file(&user_file);
        }
    }

    Ok(Settings::default())
}

/// Persist repository settings
pub fn save_settings(repo_path: &Path, settings: &Settings) -> Result<()> {
    let config_dir = get_repo_config_dir(repo_path)?;
    ensure_config_dir(&config_dir)?;
    settings.save_to_file(&config_dir.join("config.json"))
}
