use std::env;
use std::fmt;

use thiserror::Error;

/// Signing secret used when `JWT_SECRET` is not set. Refused outside development.
pub const DEV_FALLBACK_JWT_SECRET: &str = "notes-api-development-secret-do-not-deploy";

pub const MAX_ACCESS_TOKEN_TTL_MINUTES: u64 = 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: u64 = 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_ttl_days: u64,
    pub bcrypt_cost: u32,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("APP_ENV '{0}' is not one of development, staging, production")]
    UnknownEnvironment(String),

    #[error("JWT_SECRET must be set to a non-default value outside development")]
    InsecureJwtSecret,

    #[error("DATABASE_URL must be set in production")]
    MissingDatabaseUrl,

    #[error("bcrypt cost {0} is outside the supported range 4..=31")]
    InvalidBcryptCost(u32),

    #[error("{name} must be between 1 and {max}")]
    TtlOutOfRange { name: &'static str, max: u64 },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment in `from_env`).
    /// An unset or blank `APP_ENV` means development; anything unrecognised is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.parse::<Environment>()?,
            None => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let preset = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };
        Ok(preset.with_overrides(lookup))
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database overrides
        if let Some(v) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = lookup("DATABASE_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }

        // API overrides
        if let Some(v) = lookup("HOST") {
            self.api.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("SECURITY_ACCESS_TOKEN_TTL_MINUTES") {
            self.security.access_token_ttl_minutes =
                v.parse().unwrap_or(self.security.access_token_ttl_minutes);
        }
        if let Some(v) = lookup("SECURITY_REFRESH_TOKEN_TTL_DAYS") {
            self.security.refresh_token_ttl_days =
                v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }
        if let Some(v) = lookup("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    /// Reject settings that must never reach a running server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development {
            let secret = self.security.jwt_secret.trim();
            if secret.is_empty() || secret == DEV_FALLBACK_JWT_SECRET {
                return Err(ConfigError::InsecureJwtSecret);
            }
        }
        if self.environment == Environment::Production && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.security.bcrypt_cost));
        }
        if !(1..=MAX_ACCESS_TOKEN_TTL_MINUTES).contains(&self.security.access_token_ttl_minutes) {
            return Err(ConfigError::TtlOutOfRange {
                name: "SECURITY_ACCESS_TOKEN_TTL_MINUTES",
                max: MAX_ACCESS_TOKEN_TTL_MINUTES,
            });
        }
        if !(1..=MAX_REFRESH_TOKEN_TTL_DAYS).contains(&self.security.refresh_token_ttl_days) {
            return Err(ConfigError::TtlOutOfRange {
                name: "SECURITY_REFRESH_TOKEN_TTL_DAYS",
                max: MAX_REFRESH_TOKEN_TTL_DAYS,
            });
        }

        if self.security.jwt_secret == DEV_FALLBACK_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set; signing tokens with the development fallback secret");
        }

        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                auto_migrate: true,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: DEV_FALLBACK_JWT_SECRET.to_string(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 7,
                bcrypt_cost: 10,
                cors_origins: Vec::new(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                auto_migrate: true,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
                max_request_size_bytes: 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 7,
                bcrypt_cost: 10,
                cors_origins: Vec::new(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                auto_migrate: false,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 7,
                bcrypt_cost: 12,
                cors_origins: Vec::new(),
            },
        }
    }
}
