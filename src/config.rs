/// Configuration management for the download gate
use crate::error::{GateError, GateResult};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Main server configuration, built once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

/// Service-level configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `None` allows any origin
    pub cors_origins: Option<Vec<String>>,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// The artifact served by `/api/download`
    pub data_file: PathBuf,
    /// SQLite database holding licenses and downloads
    pub database: PathBuf,
    pub max_connections: u32,
}

/// Shared secrets for the public download gate and the admin surface
#[derive(Clone)]
pub struct AuthConfig {
    pub download_secret: String,
    pub admin_api_key: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("download_secret", &"<redacted>")
            .field("admin_api_key", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> GateResult<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> GateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("DATAGATE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("DATAGATE_PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map_err(|_| GateError::Config("Invalid port number".to_string()))?;

        let cors_origins = var("DATAGATE_CORS_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<String>>()
        });

        let data_file = var("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/www/globaltest/data.zip"));
        let database = var("DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/www/globaltest/licenses.db"));
        let max_connections = var("DATAGATE_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .map_err(|_| GateError::Config("Invalid database pool size".to_string()))?;

        let download_secret = var("DOWNLOAD_SECRET")
            .ok_or_else(|| GateError::Config("DOWNLOAD_SECRET is required".to_string()))?;
        let admin_api_key = var("ADMIN_API_KEY")
            .ok_or_else(|| GateError::Config("ADMIN_API_KEY is required".to_string()))?;

        Ok(ServerConfig {
            service: ServiceConfig {
                host,
                port,
                cors_origins,
            },
            storage: StorageConfig {
                data_file,
                database,
                max_connections,
            },
            auth: AuthConfig {
                download_secret,
                admin_api_key,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> GateResult<()> {
        if self.auth.download_secret.is_empty() {
            return Err(GateError::Config("Download secret cannot be empty".to_string()));
        }

        if self.auth.admin_api_key.is_empty() {
            return Err(GateError::Config("Admin API key cannot be empty".to_string()));
        }

        // The admin surface must not be reachable with the public download secret
        if self.auth.download_secret == self.auth.admin_api_key {
            return Err(GateError::Config(
                "DOWNLOAD_SECRET and ADMIN_API_KEY must differ".to_string(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(GateError::Config(
                "Database pool size must be at least 1".to_string(),
            ));
        }

        if let Some(origins) = &self.service.cors_origins {
            if let Some(bad) = origins
                .iter()
                .find(|origin| axum::http::HeaderValue::from_str(origin).is_err())
            {
                return Err(GateError::Config(format!(
                    "Invalid CORS origin: {}",
                    bad.escape_debug()
                )));
            }
        }

        Ok(())
    }
}
