//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line or through environment variables.
///
/// Each `Some` field replaces the corresponding file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub cors_origin: Option<String>,
    pub static_root: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Apply the overrides onto a configuration.
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(origin) = self.cors_origin {
            config.cors.allowed_origin = origin;
        }
        if let Some(root) = self.static_root {
            config.static_files.root = root;
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the effective configuration: file (or defaults), then overrides.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [cors]
            allowed_origin = "https://staging.lumelaunch.com"

            [static_files]
            root = "public"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.cors.allowed_origin, "https://staging.lumelaunch.com");
        assert_eq!(config.static_files.root, PathBuf::from("public"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_body_bytes = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::ZeroBodyLimit]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let overrides = ConfigOverrides {
            port: Some(4000),
            cors_origin: Some("http://localhost:5173".into()),
            static_root: None,
        };

        let config = resolve_config(None, overrides).unwrap();
        assert_eq!(config.listener.port, 4000);
        assert_eq!(config.cors.allowed_origin, "http://localhost:5173");
        assert_eq!(config.static_files.root, PathBuf::from("frontend"));
    }

    #[test]
    fn test_bad_override_fails_validation() {
        let overrides = ConfigOverrides {
            cors_origin: Some("not an origin".into()),
            ..Default::default()
        };

        assert!(matches!(
            resolve_config(None, overrides),
            Err(ConfigError::Validation(_))
        ));
    }
}
