use crate::config::schema::{EngineConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read engine config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse engine config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse engine config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid engine config ({}): {}", path.display(), source),
                None => write!(f, "invalid engine config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = load_from_str(
            r#"
[matcher]
relaxed_threshold = 0.55

[validator]
extra_globals = ["Chart", "THREE"]

[compressor.thresholds]
style = 250
"#,
        )
        .unwrap();

        assert_eq!(config.matcher.relaxed_threshold, 0.55);
        assert_eq!(config.matcher.fuzzy_threshold, 0.85);
        assert_eq!(config.validator.extra_globals, vec!["Chart", "THREE"]);
        assert_eq!(config.compressor.thresholds.style, 250);
        assert_eq!(config.repair.max_attempts, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_from_str("[matcher]\nfuzz = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load_from_str("[repair]\nmax_attempts = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("repair.max_attempts"));
    }

    #[test]
    fn path_is_attached_to_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[matcher]\nfuzzy_threshold = \"high\"\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("engine.toml"));

        let missing = load_from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
