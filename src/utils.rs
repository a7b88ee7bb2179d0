use crate::errors::{Result, StackError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Atomic file operations to prevent corruption during writes
pub mod atomic_file {
    use super::*;

    /// Write JSON data to a file atomically using a temporary file + rename strategy with file locking
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let _lock = crate::utils::file_locking::FileLock::acquire(path)?;
        write_json_unlocked(path, data)
    }

    /// Write JSON without taking the file lock; the caller must already hold it
    pub fn write_json_unlocked<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StackError::config(format!("Failed to serialize data: {e}")))?;

        write_string_unlocked(path, &content)
    }

    fn write_string_unlocked(path: &Path, content: &str) -> Result<()> {
        // Create temporary file in the same directory as the target
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, content)
            .map_err(|e| StackError::config(format!("Failed to write temporary file: {e}")))?;

        atomic_rename(&temp_path, path)
    }

    #[cfg(windows)]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

        let mut attempt = 1;
        loop {
            match fs::rename(temp_path, final_path) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= MAX_RETRIES => {
                    let _ = fs::remove_file(temp_path);
                    return Err(StackError::config(format!(
                        "Failed to finalize file write after {MAX_RETRIES} attempts on Windows: {e}"
                    )));
                }
                Err(_) => {
                    attempt += 1;
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }

    #[cfg(not(windows))]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        fs::rename(temp_path, final_path)
            .map_err(|e| StackError::config(format!("Failed to finalize file write: {e}")))?;
        Ok(())
    }
}

/// Path helpers for stack record files
pub mod path_validation {
    /// Sanitize a filename to prevent issues with special characters
    pub fn sanitize_filename(name: &str) -> String {
        name.chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect()
    }
}

/// File locking utilities for concurrent access protection
pub mod file_locking {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    /// A lock file next to the protected file, removed again on drop
    #[derive(Debug)]
    pub struct FileLock {
        _file: File,
        lock_path: PathBuf,
    }

    impl FileLock {
        #[cfg(windows)]
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
        #[cfg(windows)]
        const RETRY_INTERVAL: Duration = Duration::from_millis(100);

        #[cfg(not(windows))]
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
        #[cfg(not(windows))]
        const RETRY_INTERVAL: Duration = Duration::from_millis(50);

        /// Attempt to acquire a lock on a file with timeout
        pub fn acquire_with_timeout(file_path: &Path, timeout: Duration) -> Result<Self> {
            let lock_path = file_path.with_extension("lock");
            let start_time = Instant::now();

            loop {
                match Self::try_acquire(&lock_path) {
                    Ok(lock) => return Ok(lock),
                    Err(e) => {
                        if start_time.elapsed() >= timeout {
                            return Err(StackError::lock(format!(
                                "Timeout waiting for lock on {file_path:?} after {}ms: {e}",
                                timeout.as_millis()
                            )));
                        }
                        std::thread::sleep(Self::RETRY_INTERVAL);
                    }
                }
            }
        }

        /// Try to acquire a lock immediately (non-blocking)
        pub fn try_acquire(lock_path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_path)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::AlreadyExists => StackError::lock(format!(
                        "Lock file {lock_path:?} already exists - another process may be modifying the stack"
                    )),
                    _ => StackError::lock(format!("Failed to acquire lock {lock_path:?}: {e}")),
                })?;

            Ok(Self {
                _file: file,
                lock_path: lock_path.to_path_buf(),
            })
        }

        /// Acquire a lock with the platform default timeout
        pub fn acquire(file_path: &Path) -> Result<Self> {
            Self::acquire_with_timeout(file_path, Self::DEFAULT_TIMEOUT)
        }

        pub fn lock_path(&self) -> &Path {
            &self.lock_path
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

/// Patch naming rules
pub mod patch_names {
    use super::*;

    const MAX_GENERATED_LEN: usize = 30;

    /// Check that a patch name can be used as a ref component and a series entry
    pub fn validate_patch_name(name: &str) -> Result<()> {
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if name.is_empty()
            || !valid_chars
            || name.starts_with('.')
            || name.starts_with('-')
            || name.ends_with('.')
            || name.ends_with(".lock")
            || name.contains("..")
        {
            return Err(StackError::validation(format!(
                "Invalid patch name '{name}'"
            )));
        }
        Ok(())
    }

    /// Derive a patch name from the subject line of a commit message
    pub fn patch_name_from_message(message: &str) -> String {
        let subject = message.lines().next().unwrap_or("").trim().to_lowercase();

        let mut name = String::new();
        for c in subject.chars() {
            if c.is_ascii_alphanumeric() {
                name.push(c);
            } else if !name.is_empty() && !name.ends_with('-') {
                name.push('-');
            }
        }

        let mut name: String = name.chars().take(MAX_GENERATED_LEN).collect();
        while name.ends_with('-') {
            name.pop();
        }

        if name.is_empty() {
            "patch".to_string()
        } else {
            name
        }
    }

    /// Append a numeric suffix until `name` is not taken
    pub fn unique_patch_name<F>(name: &str, is_taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        if !is_taken(name) {
            return name.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{name}-{counter}");
            if !is_taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}
