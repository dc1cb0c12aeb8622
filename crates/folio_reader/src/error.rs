//! Error types for folio_reader
//!
//! The animation and gesture paths never fail; they clamp or ignore bad
//! input. Errors only come from configuration and book setup.

use thiserror::Error;

/// Errors that can occur setting up or repositioning a book
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Failed to read a configuration file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse configuration TOML
    #[error("Config parsing failed: {0}")]
    Config(#[from] toml::de::Error),

    /// A configuration value is out of range
    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// A book needs at least one page
    #[error("Book has no pages")]
    EmptyBook,

    /// Page index past the end of the book
    #[error("Page {index} out of range for a book of {total} pages")]
    PageOutOfRange { index: usize, total: usize },

    /// Operation refused while a cascade is running
    #[error("A batch flip is in progress")]
    BatchInProgress,
}

/// Result type for folio_reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReaderError::PageOutOfRange { index: 9, total: 5 };
        assert_eq!(err.to_string(), "Page 9 out of range for a book of 5 pages");

        let err = ReaderError::InvalidConfig {
            field: "gesture.commit_threshold",
            reason: "must be within (0, 1]".to_string(),
        };
        assert!(err.to_string().contains("gesture.commit_threshold"));
    }

    #[test]
    fn test_error_from_toml() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("flip_steps = [");
        let err: ReaderError = parse.unwrap_err().into();
        assert!(matches!(err, ReaderError::Config(_)));
    }
}
