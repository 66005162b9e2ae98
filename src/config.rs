use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Which blob store backs the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    S3,
    Local,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(BackendKind::S3),
            "local" => Ok(BackendKind::Local),
            other => Err(format!("unknown storage backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Bucket name for S3, directory name for the local backend
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO and friends)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_db_path() -> String {
    "data/app.db".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::S3
}

fn default_local_path() -> String {
    "data/blobs".to_string()
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_operation_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            container: String::new(),
            region: None,
            endpoint: None,
            force_path_style: false,
            local_path: default_local_path(),
            max_upload_bytes: default_max_upload_bytes(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs.max(1))
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: backend={:?}, container={}, max_upload_bytes={}",
            config.storage.backend,
            config.storage.container,
            config.storage.max_upload_bytes
        );
        Ok(config)
    }

    /// Load configuration from drivebox.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = [
            "drivebox.toml",
            "config.toml",
            "data/drivebox.toml",
            "data/config.toml",
        ];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: DRIVEBOX_<SECTION>_<KEY>, plus PORT, S3_BUCKET_NAME and AWS_REGION
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(val) = var("DRIVEBOX_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("DRIVEBOX_SERVER_PORT")
            .or_else(|| var("PORT"))
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Some(val) = var("DRIVEBOX_DATABASE_PATH") {
            self.database.path = val;
        }

        // Storage overrides
        if let Some(val) = var("DRIVEBOX_STORAGE_BACKEND") {
            match val.parse::<BackendKind>() {
                Ok(kind) => self.storage.backend = kind,
                Err(e) => tracing::warn!("Ignoring DRIVEBOX_STORAGE_BACKEND: {}", e),
            }
        }
        if let Some(val) = var("DRIVEBOX_STORAGE_CONTAINER").or_else(|| var("S3_BUCKET_NAME")) {
            self.storage.container = val;
        }
        if let Some(val) = var("DRIVEBOX_STORAGE_REGION").or_else(|| var("AWS_REGION")) {
            if !val.trim().is_empty() {
                self.storage.region = Some(val);
            }
        }
        if let Some(val) = var("DRIVEBOX_STORAGE_ENDPOINT") {
            if !val.trim().is_empty() {
                self.storage.endpoint = Some(val);
            }
        }
        if let Some(v) = var("DRIVEBOX_STORAGE_FORCE_PATH_STYLE").and_then(|v| v.parse().ok()) {
            self.storage.force_path_style = v;
        }
        if let Some(val) = var("DRIVEBOX_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Some(v) = var("DRIVEBOX_STORAGE_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()) {
            self.storage.max_upload_bytes = v;
        }
        if let Some(v) = var("DRIVEBOX_STORAGE_OPERATION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.storage.operation_timeout_secs = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.storage.container.trim().is_empty() {
            anyhow::bail!(
                "storage.container is not set (use DRIVEBOX_STORAGE_CONTAINER or S3_BUCKET_NAME)"
            );
        }
        if self.storage.max_upload_bytes == 0 {
            anyhow::bail!("storage.max_upload_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        if self.storage.backend == BackendKind::Local {
            fs::create_dir_all(&self.storage.local_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.backend, BackendKind::S3);
        assert_eq!(config.storage.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.storage.operation_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_legacy_env_names_apply() {
        let mut config = Config::default();
        config.apply_env_overrides(overrides(&[
            ("PORT", "8080"),
            ("S3_BUCKET_NAME", "uploads"),
            ("AWS_REGION", "eu-west-1"),
        ]));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.container, "uploads");
        assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_prefixed_env_wins_over_legacy() {
        let mut config = Config::default();
        config.apply_env_overrides(overrides(&[
            ("PORT", "8080"),
            ("DRIVEBOX_SERVER_PORT", "9000"),
            ("S3_BUCKET_NAME", "legacy"),
            ("DRIVEBOX_STORAGE_CONTAINER", "primary"),
            ("DRIVEBOX_STORAGE_BACKEND", "local"),
            ("DRIVEBOX_STORAGE_MAX_UPLOAD_BYTES", "1024"),
        ]));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.container, "primary");
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert_eq!(config.storage.max_upload_bytes, 1024);
    }

    #[test]
    fn test_backend_kind_parses() {
        assert_eq!("s3".parse::<BackendKind>(), Ok(BackendKind::S3));
        assert_eq!(" Local ".parse::<BackendKind>(), Ok(BackendKind::Local));
        assert!("gcs".parse::<BackendKind>().is_err());

        let mut config = Config::default();
        config.apply_env_overrides(overrides(&[("DRIVEBOX_STORAGE_BACKEND", "gcs")]));
        assert_eq!(config.storage.backend, BackendKind::S3);
    }

    #[test]
    fn test_validate_requires_container() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        config.storage.container = "bucket".to_string();
        assert!(config.validate().is_ok());
        config.storage.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 5000

            [storage]
            backend = "local"
            container = "files"
            local_path = "/tmp/blobs"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert_eq!(config.storage.local_path, "/tmp/blobs");
        assert_eq!(config.database.path, "data/app.db");
    }
}
