//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! Store credentials are never compiled in: they come from the config file
//! or from `WALLET_STORE_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which document store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(ConfigError::Invalid(format!("unknown store backend '{}'", other))),
        }
    }
}

/// Connection parameters for the hosted document store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    #[serde(default)]
    pub api_key: String,

    // `auth_domain`, `database_url`, `storage_bucket`, `messaging_sender_id`
    // and `app_id` complete the web app's config block so it can be pasted in
    // unchanged. The REST client does not need them; they are only reported.
    #[serde(default)]
    pub auth_domain: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub database_url: String,

    #[serde(default)]
    pub storage_bucket: String,

    #[serde(default)]
    pub messaging_sender_id: String,

    #[serde(default)]
    pub app_id: String,

    /// Optional bearer token (signed-in user's ID token)
    pub auth_token: Option<String>,

    #[serde(default = "default_database_id")]
    pub database_id: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl StoreConfig {
    /// Web-app settings that were filled in, for reporting
    pub fn web_app_settings(&self) -> Vec<(&'static str, &str)> {
        [
            ("auth_domain", self.auth_domain.as_str()),
            ("database_url", self.database_url.as_str()),
            ("storage_bucket", self.storage_bucket.as_str()),
            ("messaging_sender_id", self.messaging_sender_id.as_str()),
            ("app_id", self.app_id.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Firestore
}

fn default_database_id() -> String {
    "(default)".to_string()
}

fn default_collection() -> String {
    "usuarios".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_poll_interval() -> u64 {
    2000 // 2 seconds
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_key: String::new(),
            auth_domain: String::new(),
            project_id: String::new(),
            database_url: String::new(),
            storage_bucket: String::new(),
            messaging_sender_id: String::new(),
            app_id: String::new(),
            auth_token: None,
            database_id: default_database_id(),
            collection: default_collection(),
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl StoreConfig {
    /// Settings for a throwaway in-process store
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Default::default()
        }
    }
}

/// Dashboard behaviour: which record to watch and how the page is laid out
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Record key the dashboard watches on startup
    #[serde(default = "default_admin_key")]
    pub watch_key: String,

    /// Parent key written into every record the creator makes
    #[serde(default = "default_admin_key")]
    pub parent_key: String,

    #[serde(default = "default_tier")]
    pub default_tier: String,

    #[serde(default = "default_balance_element")]
    pub balance_element: String,

    #[serde(default = "default_income_element")]
    pub income_element: String,

    #[serde(default = "default_owner_input")]
    pub owner_input: String,

    #[serde(default = "default_linked_id_input")]
    pub linked_id_input: String,

    /// Elements present on the served page; renders to anything else are ignored
    #[serde(default = "default_page_elements")]
    pub page_elements: Vec<String>,
}

fn default_admin_key() -> String {
    "8362361029".to_string()
}

fn default_tier() -> String {
    "Sembrador".to_string()
}

fn default_balance_element() -> String {
    "main-balance".to_string()
}

fn default_income_element() -> String {
    "ingresos-totales".to_string()
}

fn default_owner_input() -> String {
    "hija-nombre".to_string()
}

fn default_linked_id_input() -> String {
    "hija-id".to_string()
}

fn default_page_elements() -> Vec<String> {
    vec![default_balance_element(), default_income_element()]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            watch_key: default_admin_key(),
            parent_key: default_admin_key(),
            default_tier: default_tier(),
            balance_element: default_balance_element(),
            income_element: default_income_element(),
            owner_input: default_owner_input(),
            linked_id_input: default_linked_id_input(),
            page_elements: default_page_elements(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_ws_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_max_connections() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_ws_connections: default_max_connections(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("wallet-watch").join("config.toml")),
            Some(PathBuf::from("/etc/wallet-watch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check settings that cannot work together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Firestore && self.store.project_id.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "store.project_id is required for the firestore backend".to_string(),
            ));
        }
        if self.store.collection.is_empty() || self.store.collection.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "store.collection '{}' is not a valid collection name",
                self.store.collection
            )));
        }
        if self.dashboard.parent_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "dashboard.parent_key cannot be empty".to_string(),
            ));
        }
        if self.store.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        let store = &mut self.store;
        if let Ok(backend) = std::env::var("WALLET_STORE_BACKEND") {
            match backend.parse() {
                Ok(b) => store.backend = b,
                Err(e) => tracing::warn!("Ignoring WALLET_STORE_BACKEND: {}", e),
            }
        }
        for (var, field) in [
            ("WALLET_STORE_API_KEY", &mut store.api_key),
            ("WALLET_STORE_AUTH_DOMAIN", &mut store.auth_domain),
            ("WALLET_STORE_PROJECT_ID", &mut store.project_id),
            ("WALLET_STORE_DATABASE_URL", &mut store.database_url),
            ("WALLET_STORE_STORAGE_BUCKET", &mut store.storage_bucket),
            ("WALLET_STORE_MESSAGING_SENDER_ID", &mut store.messaging_sender_id),
            ("WALLET_STORE_APP_ID", &mut store.app_id),
            ("WALLET_STORE_COLLECTION", &mut store.collection),
        ] {
            if let Ok(value) = std::env::var(var) {
                *field = value;
            }
        }
        if let Ok(token) = std::env::var("WALLET_STORE_AUTH_TOKEN") {
            store.auth_token = Some(token);
        }

        // Dashboard overrides
        if let Ok(key) = std::env::var("WALLET_WATCH_KEY") {
            self.dashboard.watch_key = key;
        }
        if let Ok(key) = std::env::var("WALLET_PARENT_KEY") {
            self.dashboard.parent_key = key;
        }

        // API overrides
        if let Ok(host) = std::env::var("WALLET_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("WALLET_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("WALLET_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WALLET_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Wallet Watch Configuration
#
# Environment variables override these settings:
# - WALLET_STORE_BACKEND, WALLET_STORE_API_KEY, WALLET_STORE_PROJECT_ID, ...
# - WALLET_STORE_AUTH_TOKEN
# - WALLET_WATCH_KEY, WALLET_PARENT_KEY
# - WALLET_API_HOST, WALLET_API_PORT
# - WALLET_LOG_LEVEL, WALLET_LOG_FORMAT

[store]
# Backend: "firestore" (hosted) or "memory" (in-process, for demos)
backend = "firestore"

# Web app connection parameters from the hosting console.
# Keep real values out of version control; prefer the environment.
api_key = ""
auth_domain = ""
project_id = ""
database_url = ""
storage_bucket = ""
messaging_sender_id = ""
app_id = ""

# Database and collection holding wallet records
database_id = "(default)"
collection = "usuarios"

# How often live subscriptions re-read the watched record (ms)
poll_interval_ms = 2000

# Per-request timeout (ms) and read retries
request_timeout_ms = 10000
max_retries = 3

[dashboard]
# Record shown on the dashboard
watch_key = "8362361029"

# Parent key stamped on every wallet created from the form
parent_key = "8362361029"

# Tier given to new wallets
default_tier = "Sembrador"

# Page element ids
balance_element = "main-balance"
income_element = "ingresos-totales"
owner_input = "hija-nombre"
linked_id_input = "hija-id"
page_elements = ["main-balance", "ingresos-totales"]

[api]
host = "0.0.0.0"
port = 8090
max_ws_connections = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.collection, "usuarios");
        assert!(config.store.api_key.is_empty());
        assert_eq!(config.dashboard.parent_key, "8362361029");
        assert_eq!(config.dashboard.default_tier, "Sembrador");
        assert_eq!(
            config.dashboard.page_elements,
            vec!["main-balance", "ingresos-totales"]
        );
        assert_eq!(config.api.addr(), "0.0.0.0:8090");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.poll_interval_ms, 2000);
        assert_eq!(config.dashboard.watch_key, "8362361029");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [store]
            backend = "memory"

            [dashboard]
            parent_key = "42"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.collection, "usuarios");
        assert_eq!(config.dashboard.parent_key, "42");
        assert_eq!(config.dashboard.watch_key, "8362361029");
        assert_eq!(config.api.port, 8090);
    }

    #[test]
    fn test_web_app_settings() {
        let config = Config::parse(
            r#"
[store]
project_id = "demo-project"
auth_domain = "demo-project.firebaseapp.com"
app_id = "1:123:web:abc"
"#,
        )
        .unwrap();

        assert_eq!(
            config.store.web_app_settings(),
            vec![
                ("auth_domain", "demo-project.firebaseapp.com"),
                ("app_id", "1:123:web:abc"),
            ]
        );
        assert!(Config::default().store.web_app_settings().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nbackend = \"memory\"\ncollection = \"users\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.store.collection, "users");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/wallet-watch.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        // Hosted backend without a project
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.store.project_id = "demo-project".to_string();
        assert!(config.validate().is_ok());

        config.store.backend = StoreBackend::Memory;
        config.store.project_id.clear();
        assert!(config.validate().is_ok());

        config.store.collection = "a/b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(
            "firestore".parse::<StoreBackend>().unwrap(),
            StoreBackend::Firestore
        );
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
