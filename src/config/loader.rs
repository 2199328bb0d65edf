//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::TunnelConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file without validating it.
///
/// Command-line flags are layered on top before validation.
pub fn read_config(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Mode;
    use crate::config::validation::validate_config;
    use std::io::Write;

    #[test]
    fn loads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            mode = "server"

            [server]
            listen = "0.0.0.0:443"
            target = "127.0.0.1:22"
            "#
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.mode, Some(Mode::Server));
        assert_eq!(config.server.target, "127.0.0.1:22");
    }

    #[test]
    fn validation_errors_are_listed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nlisten = \":9000\"").unwrap();

        let config = read_config(file.path()).unwrap();
        let err = ConfigError::Validation(validate_config(&config).unwrap_err());
        assert!(err.to_string().contains("mode is required"));
    }

    #[test]
    fn reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode = \"sideways\"").unwrap();

        assert!(matches!(
            read_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            read_config(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
