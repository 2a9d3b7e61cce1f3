//! Connection settings handed to the connection factory at process start.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::DbError;

/// Where and how to reach the library database.
///
/// When `url` is set it takes precedence over the individual fields.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    /// Upper bound on simultaneously open connections.
    pub max_connections: u32,
    /// How long to wait for a connection before reporting it unavailable.
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_owned(),
            port: 5432,
            database: "library_management".to_owned(),
            username: "postgres".to_owned(),
            password: None,
            max_connections: 2,
            connect_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    /// Build a config that connects through a `postgres://` URL.
    pub fn from_url(url: impl Into<String>) -> Result<Self, DbError> {
        let config = Self { url: Some(url.into()), ..Self::default() };
        config.connect_options()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Translate the settings into sqlx connect options.
    pub fn connect_options(&self) -> Result<PgConnectOptions, DbError> {
        if self.max_connections == 0 {
            return Err(DbError::InvalidConfig("max_connections must be at least 1".into()));
        }

        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| DbError::InvalidConfig(e.to_string()));
        }

        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username);

        Ok(match &self.password {
            Some(password) => options.password(password),
            None => options,
        })
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}
