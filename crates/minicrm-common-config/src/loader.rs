//! Configuration file loading and parsing.

use crate::env::{vars, EnvError, Environment};
use crate::types::MiniCrmConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Configuration loader rooted at a project directory.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the config file this loader reads and writes.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(".minicrm").join("config.yaml")
    }

    /// Load configuration from `.minicrm/config.yaml`, then apply
    /// environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(&self) -> Result<MiniCrmConfig, ConfigError> {
        let config_path = self.config_path();

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let expanded = self.expand_env_vars(&contents)?;

            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        } else {
            MiniCrmConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
            ConfigError::ParseError {
                line: None,
                message: e.to_string(),
            }
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(&cap[0], &value);
        }

        Ok(result)
    }

    fn apply_env_overrides(&self, config: &mut MiniCrmConfig) -> Result<(), ConfigError> {
        if let Some(path) = Environment::get(vars::MINICRM_DB_PATH) {
            config.database.db_path = PathBuf::from(path);
        }
        if let Some(max) = Environment::get_int::<u32>(vars::MINICRM_MAX_CONNECTIONS)? {
            config.database.max_connections = max;
        }
        Ok(())
    }

    /// Validate configuration values.
    fn validate(&self, config: &MiniCrmConfig) -> Result<(), ConfigError> {
        if config.database.db_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "database.db_path must not be empty".to_string(),
            });
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::ValidationError {
                message: "database.max_connections must be greater than 0".to_string(),
            });
        }

        if config.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "database.acquire_timeout_secs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &MiniCrmConfig) -> Result<(), ConfigError> {
        let config_path = self.config_path();
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}
