use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Signing configuration for the token codec. Access and refresh tokens use
/// separate secrets and separately configured lifetimes.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            jwt: JwtConfig {
                access_token_secret: get_env(
                    "JWT_ACCESS_TOKEN_SECRET",
                    Some("dev-access-secret-not-for-production"),
                    is_prod,
                )?,
                refresh_token_secret: get_env(
                    "JWT_REFRESH_TOKEN_SECRET",
                    Some("dev-refresh-secret-not-for-production"),
                    is_prod,
                )?,
                access_token_ttl_secs: parse_env("JWT_ACCESS_TOKEN_TTL_SECS", Some("900"), is_prod)?,
                refresh_token_ttl_secs: parse_env(
                    "JWT_REFRESH_TOKEN_TTL_SECS",
                    Some("604800"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject misconfiguration before anything is wired up. A bad token
    /// lifetime or signing secret must never surface as a runtime error.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_ttl_secs <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_TTL_SECS must be positive"
            )));
        }

        if self.jwt.refresh_token_ttl_secs <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_TTL_SECS must be positive"
            )));
        }

        if self.jwt.refresh_token_ttl_secs <= self.jwt.access_token_ttl_secs {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_TTL_SECS must exceed JWT_ACCESS_TOKEN_TTL_SECS"
            )));
        }

        if self.jwt.access_token_secret.is_empty() || self.jwt.refresh_token_secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT signing secrets must not be empty"
            )));
        }

        if self.jwt.access_token_secret == self.jwt.refresh_token_secret {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_SECRET and JWT_REFRESH_TOKEN_SECRET must differ"
            )));
        }

        if self.environment == Environment::Prod {
            if self.jwt.access_token_secret.len() < 32 || self.jwt.refresh_token_secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT signing secrets must be at least 32 bytes in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "identity-service".to_string(),
            service_version: "2.0.0".to_string(),
            log_level: "info".to_string(),
            database: DatabaseConfig {
                url: "postgres://localhost/identity".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            jwt: JwtConfig {
                access_token_secret: "access-secret-access-secret-access".to_string(),
                refresh_token_secret: "refresh-secret-refresh-secret-refresh".to_string(),
                access_token_ttl_secs: 900,
                refresh_token_ttl_secs: 604800,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_non_positive_ttl_is_fatal() {
        let mut cfg = config();
        cfg.jwt.access_token_ttl_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.jwt.refresh_token_ttl_secs = -1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_refresh_ttl_must_exceed_access_ttl() {
        let mut cfg = config();
        cfg.jwt.refresh_token_ttl_secs = cfg.jwt.access_token_ttl_secs;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_shared_secret_is_fatal() {
        let mut cfg = config();
        cfg.jwt.refresh_token_secret = cfg.jwt.access_token_secret.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected_in_prod_only() {
        let mut cfg = config();
        cfg.jwt.access_token_secret = "short-a".to_string();
        cfg.jwt.refresh_token_secret = "short-r".to_string();
        assert!(cfg.validate().is_ok());

        cfg.environment = Environment::Prod;
        assert!(cfg.validate().is_err());
    }
}
