/// Patchstack Error Types
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad selections, unknown patches and other usage mistakes
    #[error("{0}")]
    Validation(String),

    /// Conflict resolution errors
    #[error("Conflict error: {0}")]
    Conflict(String),

    /// A transaction stopped on a conflict after persisting its progress
    #[error("{0}")]
    Halted(String),

    /// Stack record and repository disagree
    #[error("Stack corruption: {0}")]
    Corruption(String),

    /// Another process holds the stack lock
    #[error("Lock error: {0}")]
    Lock(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StackError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StackError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        StackError::Validation(msg.into())
    }

    pub fn not_initialized<S: Into<String>>(msg: S) -> Self {
        StackError::config(msg.into())
    }

    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        StackError::Validation(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        StackError::Conflict(msg.into())
    }

    pub fn halted<S: Into<String>>(msg: S) -> Self {
        StackError::Halted(msg.into())
    }

    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        StackError::Corruption(msg.into())
    }

    pub fn lock<S: Into<String>>(msg: S) -> Self {
        StackError::Lock(msg.into())
    }

    /// Whether this error was raised before anything was touched
    pub fn is_usage(&self) -> bool {
        matches!(self, StackError::Validation(_))
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            StackError::Validation(_) => 2,
            StackError::Halted(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_usage_and_halt() {
        assert_eq!(StackError::validation("bad").exit_code(), 2);
        assert_eq!(StackError::halted("stopped").exit_code(), 3);
        assert_eq!(StackError::config("broken").exit_code(), 1);
        assert_eq!(
            StackError::Git(git2::Error::from_str("boom")).exit_code(),
            1
        );
    }

    #[test]
    fn test_usage_messages_are_not_prefixed() {
        let err = StackError::validation("There are not that many applied patches");
        assert_eq!(err.to_string(), "There are not that many applied patches");
        assert!(err.is_usage());
        assert!(!StackError::halted("x").is_usage());
    }
}
