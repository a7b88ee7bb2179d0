use crate::errors::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub git: GitConfig,
    pub stack: StackSettings,
}

/// Identity used for the commits patchstack creates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Leave conflict markers in the working tree when a push conflicts
    pub allow_push_conflicts: bool,
    /// Number of undo entries kept per stack
    pub max_log_entries: usize,
    /// Refuse to start mutating commands with local modifications
    pub require_clean_worktree: bool,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            allow_push_conflicts: true,
            max_log_entries: 100,
            require_clean_worktree: true,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| StackError::config(format!("Invalid boolean value: {value}")))
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| StackError::config(format!("Failed to read config file: {e}")))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| StackError::config(format!("Failed to parse config file: {e}")))?;

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        crate::utils::atomic_file::write_json(path, self)
    }

    /// Update a configuration value by key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(StackError::config(format!(
                "Invalid config key format: {key}"
            )));
        }

        match (parts[0], parts[1]) {
            ("git", "author_name") => self.git.author_name = Some(value.to_string()),
            ("git", "author_email") => self.git.author_email = Some(value.to_string()),
            ("stack", "allow_push_conflicts") => {
                self.stack.allow_push_conflicts = parse_bool(value)?;
            }
            ("stack", "max_log_entries") => {
                self.stack.max_log_entries = value
                    .parse()
                    .map_err(|_| StackError::config(format!("Invalid number: {value}")))?;
            }
            ("stack", "require_clean_worktree") => {
                self.stack.require_clean_worktree = parse_bool(value)?;
            }
            _ => return Err(StackError::config(format!("Unknown config key: {key}"))),
        }

        self.validate()
    }

    /// Get a configuration value by key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "git.author_name" => self.git.author_name.clone().unwrap_or_default(),
            "git.author_email" => self.git.author_email.clone().unwrap_or_default(),
            "stack.allow_push_conflicts" => self.stack.allow_push_conflicts.to_string(),
            "stack.max_log_entries" => self.stack.max_log_entries.to_string(),
            "stack.require_clean_worktree" => self.stack.require_clean_worktree.to_string(),
            _ => return Err(StackError::config(format!("Unknown config key: {key}"))),
        };

        Ok(value)
    }

    /// All keys with their current values, in display order
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        [
            "git.author_name",
            "git.author_email",
            "stack.allow_push_conflicts",
            "stack.max_log_entries",
            "stack.require_clean_worktree",
        ]
        .into_iter()
        .filter_map(|key| self.get_value(key).ok().map(|value| (key, value)))
        .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.stack.max_log_entries == 0 {
            return Err(StackError::config(
                "stack.max_log_entries must be at least 1",
            ));
        }

        if let Some(email) = &self.git.author_email {
            if !email.is_empty() && !email.contains('@') {
                return Err(StackError::config(format!(
                    "Invalid author email: {email}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.stack.allow_push_conflicts);
        assert!(settings.stack.require_clean_worktree);
        assert_eq!(settings.stack.max_log_entries, 100);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_set_and_get_values() {
        let mut settings = Settings::default();
        settings.set_value("git.author_name", "Ada").unwrap();
        settings
            .set_value("stack.allow_push_conflicts", "false")
            .unwrap();

        assert_eq!(settings.get_value("git.author_name").unwrap(), "Ada");
        assert_eq!(
            settings.get_value("stack.allow_push_conflicts").unwrap(),
            "false"
        );
        assert!(settings.set_value("stack.unknown", "1").is_err());
        assert!(settings.set_value("nodots", "1").is_err());
        assert!(settings
            .set_value("stack.require_clean_worktree", "maybe")
            .is_err());
        assert!(settings.set_value("stack.max_log_entries", "0").is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"stack": {"max_log_entries": 5}}"#).unwrap();
        assert_eq!(settings.stack.max_log_entries, 5);
        assert!(settings.stack.allow_push_conflicts);
        assert!(settings.git.author_name.is_none());
    }
}
