use crate::config::schema::{PatcherConfig, ValidationError};
use crate::config::DEFAULT_CONFIG_FILE;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the active configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named with `--config`
    Explicit(PathBuf),
    /// Named by the environment variable
    Env(PathBuf),
    /// Found in the working directory
    Local(PathBuf),
    /// Nothing found; built-in markers and write policy
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Env(path) | ConfigSource::Local(path) => {
                Some(path.as_path())
            }
            ConfigSource::Defaults => None,
        }
    }

    /// Load the configuration this source points at.
    pub fn load(&self) -> Result<PatcherConfig, ConfigError> {
        match self.path() {
            Some(path) => load_from_path(path),
            None => Ok(PatcherConfig::default()),
        }
    }
}

/// Pick the config source.
///
/// An explicit path always wins, even if it does not exist, so a typo is
/// reported instead of silently falling back. An environment path that does
/// not exist is skipped and returned alongside the source so the caller can
/// warn about it.
pub fn discover(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    cwd: &Path,
) -> (ConfigSource, Option<PathBuf>) {
    if let Some(path) = explicit {
        return (ConfigSource::Explicit(path.to_path_buf()), None);
    }

    let mut stale_env = None;
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if path.exists() {
            return (ConfigSource::Env(path), None);
        }
        stale_env = Some(path);
    }

    let local = cwd.join(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        (ConfigSource::Local(local), stale_env)
    } else {
        (ConfigSource::Defaults, stale_env)
    }
}

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
    fn at(self, path: &Path) -> Self {
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }

    fn location(path: &Option<PathBuf>) -> String {
        path.as_ref()
            .map(|p| format!(" {}", p.display()))
            .unwrap_or_default()
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => {
                write!(f, "config{} is not valid TOML: {}", Self::location(path), source)
            }
            ConfigError::Validation { path, source } => {
                let count = source.issues.len();
                write!(
                    f,
                    "config{} has {} problem{}:",
                    Self::location(path),
                    count,
                    if count == 1 { "" } else { "s" }
                )?;
                for issue in &source.issues {
                    write!(f, "\n  - {issue}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            // Display already lists every issue
            ConfigError::Validation { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatcherConfig, ConfigError> {
    let config: PatcherConfig =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatcherConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.at(path))
}
