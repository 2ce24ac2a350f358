//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{GatewayConfig, JwtConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension. Anything but `.yaml`/`.yml` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

/// Environment variables that override file values.
pub const ENV_SERVER_HOST: &str = "GATEWAY_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "GATEWAY_SERVER_PORT";
pub const ENV_LOGGING_LEVEL: &str = "GATEWAY_LOGGING_LEVEL";
pub const ENV_JWT_SECRET: &str = "GATEWAY_JWT_SECRET";

/// Load, apply environment overrides, and validate configuration from a file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with_env(path, |var| std::env::var(var).ok())
}

/// Like [`load_config`], reading overrides through `env` instead of the process environment.
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&content, ConfigFormat::from_path(path))?;
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        path = %path.display(),
        services = config.services.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Parse and validate an in-memory document. No environment overrides are applied.
pub fn load_config_str(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    let config = parse_config(content, format)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Deserialize without semantic validation.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    match format {
        ConfigFormat::Toml => Ok(toml::from_str(content)?),
        ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

/// Apply `GATEWAY_*` overrides on top of the parsed document.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env(ENV_SERVER_HOST) {
        config.server.host = host;
    }

    if let Some(port) = env(ENV_SERVER_PORT) {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_SERVER_PORT,
            reason: format!("`{}`: {}", port, e),
        })?;
    }

    if let Some(level) = env(ENV_LOGGING_LEVEL) {
        config.logging.level = level;
    }

    if let Some(secret) = env(ENV_JWT_SECRET) {
        if secret.is_empty() {
            return Err(ConfigError::Env {
                var: ENV_JWT_SECRET,
                reason: "must not be empty".to_string(),
            });
        }
        config.jwt = Some(JwtConfig { secret });
    }

    Ok(())
}
