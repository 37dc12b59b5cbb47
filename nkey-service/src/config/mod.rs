use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_optional_env, parse_env};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub nkey: NKeyConfig,
    pub pushdeer: PushDeerConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory store (development only).
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_minutes: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiration_minutes", &self.expiration_minutes)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NKeyConfig {
    pub expiration_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushDeerConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub validate_limit: u32,
    pub validate_window_seconds: u64,
    /// Key limits and audit records on `x-forwarded-for`. Only safe behind
    /// a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me-before-deploying!!";
const MIN_PROD_SECRET_BYTES: usize = 32;
const MAX_NKEY_EXPIRATION_SECONDS: i64 = 86_400;
const MAX_JWT_EXPIRATION_MINUTES: i64 = 525_600;

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database_url = if is_prod {
            Some(get_env("DATABASE_URL", None, true)?)
        } else {
            get_optional_env("DATABASE_URL")
        };

        let config = ServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("nkey-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env(
                    "DATABASE_MAX_CONNECTIONS",
                    &get_env("DATABASE_MAX_CONNECTIONS", Some("10"), false)?,
                )?,
                min_connections: parse_env(
                    "DATABASE_MIN_CONNECTIONS",
                    &get_env("DATABASE_MIN_CONNECTIONS", Some("1"), false)?,
                )?,
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", Some(DEV_JWT_SECRET), is_prod)?,
                expiration_minutes: parse_env(
                    "JWT_EXPIRATION_MINUTES",
                    &get_env("JWT_EXPIRATION_MINUTES", Some("1440"), false)?,
                )?,
            },
            nkey: NKeyConfig {
                expiration_seconds: parse_env(
                    "NKEY_EXPIRATION_SECONDS",
                    &get_env("NKEY_EXPIRATION_SECONDS", Some("900"), false)?,
                )?,
            },
            pushdeer: PushDeerConfig {
                api_url: get_env(
                    "PUSHDEER_API",
                    Some("https://api2.pushdeer.com/message/push"),
                    false,
                )?,
                timeout_seconds: parse_env(
                    "PUSHDEER_TIMEOUT_SECONDS",
                    &get_env("PUSHDEER_TIMEOUT_SECONDS", Some("10"), false)?,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), false)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    false,
                )?
                .parse()
                .unwrap_or(900),
                register_attempts: get_env("RATE_LIMIT_REGISTER_ATTEMPTS", Some("3"), false)?
                    .parse()
                    .unwrap_or(3),
                register_window_seconds: get_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    Some("3600"),
                    false,
                )?
                .parse()
                .unwrap_or(3600),
                validate_limit: get_env("RATE_LIMIT_VALIDATE_LIMIT", Some("120"), false)?
                    .parse()
                    .unwrap_or(120),
                validate_window_seconds: get_env(
                    "RATE_LIMIT_VALIDATE_WINDOW_SECONDS",
                    Some("60"),
                    false,
                )?
                .parse()
                .unwrap_or(60),
                trust_forwarded_for: get_env("TRUST_FORWARDED_FOR", Some("false"), false)?
                    .parse()
                    .unwrap_or(false),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !(1..=MAX_JWT_EXPIRATION_MINUTES).contains(&self.jwt.expiration_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_EXPIRATION_MINUTES must be between 1 and {}",
                MAX_JWT_EXPIRATION_MINUTES
            )));
        }

        if !(1..=MAX_NKEY_EXPIRATION_SECONDS).contains(&self.nkey.expiration_seconds) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "NKEY_EXPIRATION_SECONDS must be between 1 and {}",
                MAX_NKEY_EXPIRATION_SECONDS
            )));
        }

        if self.jwt.secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        if self.is_prod() {
            if self.jwt.secret.len() < MIN_PROD_SECRET_BYTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_BYTES
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        } else if self.jwt.secret == DEV_JWT_SECRET {
            tracing::warn!("Using the built-in development JWT secret");
        }

        Ok(())
    }

    /// Configuration for tests and local tooling: in-memory store, default
    /// TTLs, generous rate limits.
    pub fn for_tests() -> Self {
        ServiceConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "nkey-service-test".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                min_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
                expiration_minutes: 1440,
            },
            nkey: NKeyConfig {
                expiration_seconds: 900,
            },
            pushdeer: PushDeerConfig {
                api_url: "http://127.0.0.1:9/message/push".to_string(),
                timeout_seconds: 1,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            rate_limit: RateLimitConfig {
                login_attempts: 1000,
                login_window_seconds: 60,
                register_attempts: 1000,
                register_window_seconds: 60,
                validate_limit: 1000,
                validate_window_seconds: 60,
                trust_forwarded_for: true,
            },
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
