use std::fmt;

use crate::auth::password::MIN_SALT_LEN;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct PasswordConfig {
    pub salt: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub server: ServerConfig,
}

// secrets never reach the logs
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("run_migrations", &self.run_migrations)
            .field("jwt_secret", &"<redacted>")
            .field("encrypt_salt", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Every value is checked here so
    /// a bad deployment fails before the listener binds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let secret = required("JWT_SECRET")?;
        let salt = required("ENCRYPT_SALT")?;
        if salt.len() < MIN_SALT_LEN {
            return Err(ConfigError::Invalid {
                key: "ENCRYPT_SALT",
                reason: format!("must be at least {MIN_SALT_LEN} bytes"),
            });
        }
        let database_url = required("DATABASE_URL")?;

        let host = get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port_var = get("APP_PORT")
            .map(|v| ("APP_PORT", v))
            .or_else(|| get("PORT").map(|v| ("PORT", v)));
        let port = match port_var {
            Some((key, raw)) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        key: "DB_MAX_CONNECTIONS",
                        reason: "must be positive".into(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: "DB_MAX_CONNECTIONS",
                        reason: e.to_string(),
                    })
                }
            },
            None => 10,
        };

        let run_migrations = match get("MIGRATION_ENABLE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "MIGRATION_ENABLE",
                reason: format!("expected a boolean, got {raw:?}"),
            })?,
            None => false,
        };

        Ok(Self {
            database_url,
            max_connections,
            run_migrations,
            jwt: JwtConfig { secret },
            password: PasswordConfig { salt },
            server: ServerConfig { host, port },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
