//! Environment variable handling.

use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Environment variable names.
pub mod vars {
    pub const MINICRM_CONFIG_DIR: &str = "MINICRM_CONFIG_DIR";
    pub const MINICRM_DB_PATH: &str = "MINICRM_DB_PATH";
    pub const MINICRM_MAX_CONNECTIONS: &str = "MINICRM_MAX_CONNECTIONS";
    pub const MINICRM_LOG_LEVEL: &str = "MINICRM_LOG_LEVEL";
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Access to process environment, seeded from `.env` files.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Load `.env.local` then `.env` from the working directory.
    ///
    /// Missing files are not an error. Variables that are already set
    /// are never overwritten.
    pub fn init() -> Result<Self, EnvError> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: format!("expected integer, got {:?}", v),
            }),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_default() {
        let val = Environment::get_or("MINICRM_NONEXISTENT_12345", "default");
        assert_eq!(val, "default");
    }

    #[test]
    fn test_require_missing() {
        match Environment::require("MINICRM_NONEXISTENT_REQUIRED") {
            Err(EnvError::NotSet { var }) => assert_eq!(var, "MINICRM_NONEXISTENT_REQUIRED"),
            other => panic!("expected NotSet, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_parsing() {
        env::set_var("MINICRM_TEST_INT", " 42 ");
        let val: Result<Option<u32>, _> = Environment::get_int("MINICRM_TEST_INT");
        assert_eq!(val.unwrap(), Some(42));

        env::set_var("MINICRM_TEST_INT", "many");
        let val: Result<Option<u32>, _> = Environment::get_int("MINICRM_TEST_INT");
        assert!(matches!(val, Err(EnvError::InvalidValue { .. })));

        env::remove_var("MINICRM_TEST_INT");
        let val: Result<Option<u32>, _> = Environment::get_int("MINICRM_TEST_INT");
        assert_eq!(val.unwrap(), None);
    }

    #[test]
    fn test_environment_init_without_files() {
        assert!(Environment::init().is_ok());
    }
}
