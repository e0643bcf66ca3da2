use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::collection::validation::normalize_extensions;

const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf", "doc", "docx"];

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub uploads: UploadConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            uploads: UploadConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Backend used to persist uploaded file bodies. The record store is always in memory,
/// so `Local` keeps file bodies across restarts while their upload rows are lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Local,
}

/// Upload limits and the storage location used by the file store adapters.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub storage: StorageKind,
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage = match env::var("APP_STORAGE") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "memory" => StorageKind::Memory,
                "local" => StorageKind::Local,
                _ => return Err(ConfigError::InvalidStorage(raw)),
            },
            Err(_) => defaults.storage,
        };

        let upload_dir = env::var("APP_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let max_file_size = match env::var("APP_MAX_FILE_SIZE") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(size) if size > 0 => size,
                _ => return Err(ConfigError::InvalidMaxFileSize),
            },
            Err(_) => defaults.max_file_size,
        };

        let allowed_extensions = match env::var("APP_ALLOWED_EXTENSIONS") {
            Ok(raw) => {
                let parsed = parse_extensions(&raw);
                if parsed.is_empty() {
                    return Err(ConfigError::EmptyExtensionList);
                }
                parsed
            }
            Err(_) => defaults.allowed_extensions,
        };

        Ok(Self {
            storage,
            upload_dir,
            max_file_size,
            allowed_extensions,
        })
    }
}

/// Split a comma separated extension list, normalizing case and leading dots.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    normalize_extensions(raw.split(',').map(str::to_string).collect())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStorage(String),
    InvalidMaxFileSize,
    EmptyExtensionList,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStorage(value) => {
                write!(f, "APP_STORAGE must be 'memory' or 'local' (found '{value}')")
            }
            ConfigError::InvalidMaxFileSize => {
                write!(f, "APP_MAX_FILE_SIZE must be a positive number of bytes")
            }
            ConfigError::EmptyExtensionList => {
                write!(f, "APP_ALLOWED_EXTENSIONS must list at least one extension")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidStorage(_)
            | ConfigError::InvalidMaxFileSize
            | ConfigError::EmptyExtensionList => None,
        }
    }
}

/// Serializes tests that read or mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_STORAGE",
            "APP_UPLOAD_DIR",
            "APP_MAX_FILE_SIZE",
            "APP_ALLOWED_EXTENSIONS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.uploads.max_file_size, 20_971_520);
        assert_eq!(config.uploads.storage, StorageKind::Memory);
        assert_eq!(
            config.uploads.allowed_extensions,
            vec!["jpg", "jpeg", "png", "pdf", "doc", "docx"]
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn upload_overrides_are_normalized() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_STORAGE", "Local");
        env::set_var("APP_MAX_FILE_SIZE", "1024");
        env::set_var("APP_ALLOWED_EXTENSIONS", " .PDF, png ,,");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.uploads.storage, StorageKind::Local);
        assert_eq!(config.uploads.max_file_size, 1024);
        assert_eq!(config.uploads.allowed_extensions, vec!["pdf", "png"]);
        reset_env();
    }

    #[test]
    fn rejects_zero_max_file_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MAX_FILE_SIZE", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidMaxFileSize)
        ));
        reset_env();
    }
}
