use thiserror::Error;

/// Errors raised by the crate's own fallible operations.
///
/// Network failures are never wrapped in this type: `LensClient::execute`
/// hands the transport's error back to the caller untouched.
#[derive(Error, Debug)]
pub enum LensError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for lens operations
pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = LensError::Config("unsupported extension: ini".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: unsupported extension: ini"
        );
    }

    #[test]
    fn test_invalid_pattern_error() {
        let error = LensError::InvalidPattern("(unclosed".to_string());
        assert_eq!(error.to_string(), "Invalid exclusion pattern: (unclosed");
    }

    #[test]
    fn test_invalid_header_error() {
        let error = LensError::InvalidHeader("bad name".to_string());
        assert_eq!(error.to_string(), "Invalid header: bad name");
    }

    #[test]
    fn test_toml_error_from_toml() {
        let toml_error = toml::from_str::<toml::Value>("level = ").unwrap_err();
        let error: LensError = toml_error.into();
        assert!(error.to_string().starts_with("TOML parse error:"));
    }

    #[test]
    fn test_yaml_error_from_serde_yaml() {
        let yaml_error = serde_yaml::from_str::<Vec<String>>("level: body").unwrap_err();
        let error: LensError = yaml_error.into();
        assert!(error.to_string().starts_with("YAML parse error:"));
    }

    #[test]
    fn test_serialization_error_from_serde() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let error: LensError = json_error.into();
        assert!(error.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_io_error_from_std() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: LensError = io_error.into();
        assert!(error.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_error_is_debug() {
        let error = LensError::Config("test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("Config"));
    }
}
