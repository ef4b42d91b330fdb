//! TOML-based configuration for feyna
//!
//! The demo server and `RouterRegistry::from_config` read a `feyna.toml`:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! log_level = "info"
//! environment = "development"
//!
//! [auth]
//! jwt_secret_env = "JWT_SECRET"
//!
//! [router]
//! strict_mount = true
//!
//! [roles]
//! User = ["Admin"]
//! ```
//!
//! Secrets never live in the file; `[auth]` names the environment variable
//! holding the signing secret.

use crate::auth::roles::RolePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable selecting the runtime environment when the file does not.
pub const ENVIRONMENT_VAR: &str = "FEYNA_ENV";

/// Root configuration structure loaded from feyna.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeynaConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub router: RouterSettings,

    /// Role hierarchy: each role lists the roles that also satisfy it
    #[serde(default = "default_roles")]
    pub roles: HashMap<String, Vec<String>>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "Environment::from_env")]
    pub environment: Environment,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            environment: Environment::from_env(),
        }
    }
}

/// Runtime environment. Only gates diagnostic timing logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Reads `FEYNA_ENV`; anything other than `production` is development.
    pub fn from_env() -> Self {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
}

fn default_jwt_secret_env() -> String {
    "JWT_SECRET".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
        }
    }
}

// ============= Router Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Refuse to mount routers without a base path instead of mounting them at `/`
    #[serde(default = "default_true")]
    pub strict_mount: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            strict_mount: default_true(),
        }
    }
}

fn default_roles() -> HashMap<String, Vec<String>> {
    HashMap::from([("User".to_string(), vec!["Admin".to_string()])])
}

impl Default for FeynaConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            router: RouterSettings::default(),
            roles: default_roles(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl FeynaConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FeynaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret_env must name an environment variable".to_string(),
            ));
        }

        for (role, by) in &self.roles {
            if role.is_empty() || by.iter().any(String::is_empty) {
                return Err(ConfigError::ValidationError(format!(
                    "roles.{}: role names must not be empty",
                    role
                )));
            }
            if role == "*" || by.iter().any(|r| r == "*") {
                return Err(ConfigError::ValidationError(format!(
                    "roles.{}: '*' is reserved for the wildcard requirement",
                    role
                )));
            }
        }

        Ok(())
    }

    /// Get the JWT secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        std::env::var(&self.auth.jwt_secret_env)
            .map_err(|_| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy::from_table(&self.roles)
    }
}
