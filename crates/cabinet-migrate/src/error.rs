//! Error types for the upload library.

use thiserror::Error;

/// Process exit code for configuration and parse errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code for staging store failures.
pub const EXIT_STAGING_ERROR: u8 = 2;
/// Process exit code when the initial login is rejected.
pub const EXIT_AUTH_ERROR: u8 = 3;
/// Process exit code for remote transport failures outside the record loop.
pub const EXIT_REMOTE_ERROR: u8 = 4;
/// Process exit code for a run that stopped after a failed relogin.
pub const EXIT_RUN_ABORTED: u8 = 5;
/// Process exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for upload operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Staging database query or connection error
    #[error("Staging database error: {0}")]
    Staging(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Login against the document service was rejected
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// HTTP transport error talking to the document service
    #[error("Remote service error: {0}")]
    Remote(#[from] reqwest::Error),

    /// Staging record invariant violated (double write, bad row data)
    #[error("Staging state error: {0}")]
    State(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Staging(_) | MigrateError::Pool { .. } | MigrateError::State(_) => {
                EXIT_STAGING_ERROR
            }
            MigrateError::AuthFailure(_) => EXIT_AUTH_ERROR,
            MigrateError::Remote(_) => EXIT_REMOTE_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::pool("down", "connect").exit_code(), EXIT_STAGING_ERROR);
        assert_eq!(MigrateError::State("x".into()).exit_code(), EXIT_STAGING_ERROR);
        assert_eq!(MigrateError::AuthFailure("x".into()).exit_code(), EXIT_AUTH_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml missing");
        let detailed = MigrateError::from(io).format_detailed();
        assert!(detailed.starts_with("Error: IO error: config.yaml missing"));
    }

    #[test]
    fn test_pool_error_carries_context() {
        let err = MigrateError::pool("timed out", "connecting to staging store");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("connecting to staging store"));
    }
}
