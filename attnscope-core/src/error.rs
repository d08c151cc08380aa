//! Error types for configuration loading.

use std::path::PathBuf;

/// Errors raised while loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_display() {
        let err = ConfigError::FileNotFound {
            path: PathBuf::from("/tmp/missing.toml"),
        };
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /tmp/missing.toml"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConfigError = io.into();
        assert!(err.to_string().starts_with("IO error:"));
    }
}
