use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string; `memory://` selects the in-process store
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Identity provider domain, e.g. `my-tenant.us.auth0.com`
    pub domain: String,
    pub audience: String,
    pub jwks_cache_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub origins: AllowedOrigins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl AllowedOrigins {
    /// Parse a comma-separated allow-list; `*` anywhere means any origin.
    /// `None` when the value names no origin at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .collect();

        if origins.is_empty() {
            None
        } else if origins.iter().any(|o| o == "*") {
            Some(AllowedOrigins::Any)
        } else {
            Some(AllowedOrigins::List(origins))
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("DEBUG") {
            self.server.debug = parse_flag("DEBUG", &v)?;
        }

        // Database
        if let Some(v) = lookup("DATABASE_URL").or_else(|| lookup("MONGO_URI")) {
            self.database.url = v;
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_var("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }

        // Identity provider
        if let Some(v) = lookup("AUTH0_DOMAIN") {
            self.auth.domain = normalize_domain(&v);
        }
        if let Some(v) = lookup("AUTH0_AUDIENCE") {
            self.auth.audience = v.trim().to_string();
        }
        if let Some(v) = lookup("JWKS_CACHE_TTL_SECS") {
            self.auth.jwks_cache_ttl_secs = parse_var("JWKS_CACHE_TTL_SECS", &v)?;
        }

        // CORS
        if let Some(v) = lookup("FRONTEND_ORIGINS") {
            self.cors.origins = AllowedOrigins::parse(&v).ok_or_else(|| ConfigError::Invalid {
                name: "FRONTEND_ORIGINS",
                value: v.clone(),
            })?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.domain.is_empty() {
            return Err(ConfigError::Missing("AUTH0_DOMAIN"));
        }
        if self.auth.audience.is_empty() {
            return Err(ConfigError::Missing("AUTH0_AUDIENCE"));
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 5000,
                debug: true,
            },
            database: DatabaseConfig {
                url: "postgres://localhost:5432/tarefasdb".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            auth: AuthConfig {
                domain: String::new(),
                audience: String::new(),
                jwks_cache_ttl_secs: 3600,
            },
            cors: CorsConfig {
                origins: AllowedOrigins::Any,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 5000,
                debug: false,
            },
            database: DatabaseConfig {
                url: "postgres://localhost:5432/tarefasdb".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            auth: AuthConfig {
                domain: String::new(),
                audience: String::new(),
                jwks_cache_ttl_secs: 3600,
            },
            cors: CorsConfig {
                origins: AllowedOrigins::Any,
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

/// Accept `tenant.auth0.com`, `https://tenant.auth0.com/` and the like
fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}
