//! Configuration loading for stockroomd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.stockroom/config.toml` (user)
//! 3. `/etc/stockroom/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.stockroom/secrets.toml` (user, must be 0600)
//! 2. `/etc/stockroom/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{StockroomBuilder, ViewConfig};
use crate::refresh::RefreshConfig;
use crate::snapshot::default_snapshot_path;
use crate::store::DEFAULT_PREFIX;
use crate::upstream::{OAuthCredentials, RetryConfig};
use crate::{Result, Stockroom, StockroomError};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3001).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:3001".to_string()
}

/// Shared cache store.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. Without one the daemon uses an in-process store and the
    /// refresh lock only covers this replica.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Key prefix (default: "zoho").
    #[serde(default = "default_prefix")]
    pub key_prefix: String,
    /// Per-command timeout in milliseconds (default: 500).
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_prefix(),
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_store_timeout_ms() -> u64 {
    500
}

/// Kit catalog refresh settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_hard_ttl")]
    pub hard_ttl_secs: u64,
    #[serde(default = "default_soft_ttl")]
    pub soft_ttl_secs: u64,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_type_label")]
    pub type_label: String,
    #[serde(default = "default_kit_categories")]
    pub kit_categories: Vec<String>,
    /// Snapshot file (default: `~/.cache/stockroom/products-cache.json`).
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Refresh once at startup (default: true).
    #[serde(default = "default_true")]
    pub prewarm: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            hard_ttl_secs: default_hard_ttl(),
            soft_ttl_secs: default_soft_ttl(),
            lock_ttl_secs: default_lock_ttl(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            retry_max_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_delay_ms(),
            type_label: default_type_label(),
            kit_categories: default_kit_categories(),
            snapshot_path: None,
            prewarm: true,
        }
    }
}

fn default_hard_ttl() -> u64 {
    3600
}

fn default_soft_ttl() -> u64 {
    600
}

fn default_lock_ttl() -> u64 {
    120
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    3500
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_type_label() -> String {
    "Type".to_string()
}

fn default_kit_categories() -> Vec<String> {
    RefreshConfig::default().kit_categories
}

fn default_true() -> bool {
    true
}

/// Ingredients/services view settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
    #[serde(default = "default_view_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_ingredient_pause_ms")]
    pub ingredient_batch_pause_ms: u64,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_view_ttl(),
            ingredient_batch_pause_ms: default_ingredient_pause_ms(),
        }
    }
}

fn default_view_ttl() -> u64 {
    300
}

fn default_ingredient_pause_ms() -> u64 {
    2000
}

/// Inventory provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Data-centre domain suffix (default: ".com").
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Organization id; falls back to `ZOHO_ORG_ID`.
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            organization_id: None,
        }
    }
}

fn default_domain() -> String {
    ".com".to_string()
}

impl UpstreamConfig {
    /// Organization id from the config file or `ZOHO_ORG_ID`.
    pub fn organization_id(&self) -> Result<String> {
        self.organization_id
            .clone()
            .or_else(|| std::env::var("ZOHO_ORG_ID").ok())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                StockroomError::Configuration(
                    "upstream.organization_id is not set (or ZOHO_ORG_ID)".to_string(),
                )
            })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// OAuth secrets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

const ENV_CLIENT_ID: &str = "ZOHO_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "ZOHO_CLIENT_SECRET";
const ENV_REFRESH_TOKEN: &str = "ZOHO_REFRESH_TOKEN";

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.stockroom/config.toml`
    /// 3. `/etc/stockroom/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            StockroomError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            StockroomError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(StockroomError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stockroom").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/stockroom/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(StockroomError::Configuration(
            "No config file found. Create ~/.stockroom/config.toml or /etc/stockroom/config.toml"
                .to_string(),
        ))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.catalog
            .snapshot_path
            .clone()
            .unwrap_or_else(default_snapshot_path)
    }

    /// A catalog builder carrying every setting from this config.
    ///
    /// The caller still supplies the inventory source and the store.
    pub fn catalog_builder(&self) -> StockroomBuilder {
        let catalog = &self.catalog;
        let retry = RetryConfig::new()
            .max_attempts(catalog.retry_max_attempts)
            .initial_delay(Duration::from_millis(catalog.retry_initial_delay_ms));
        let refresh = RefreshConfig::new()
            .lock_ttl(Duration::from_secs(catalog.lock_ttl_secs))
            .batch_size(catalog.batch_size)
            .batch_pause(Duration::from_millis(catalog.batch_pause_ms))
            .retry(retry)
            .type_label(catalog.type_label.clone())
            .kit_categories(catalog.kit_categories.iter().cloned());
        let views = ViewConfig {
            ttl: Duration::from_secs(self.views.ttl_secs),
            ingredient_batch_pause: Duration::from_millis(self.views.ingredient_batch_pause_ms),
        };

        Stockroom::builder()
            .key_prefix(self.cache.key_prefix.clone())
            .freshness(
                Duration::from_secs(catalog.hard_ttl_secs),
                Duration::from_secs(catalog.soft_ttl_secs),
            )
            .refresh(refresh)
            .views(views)
            .snapshot(self.snapshot_path())
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.stockroom/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/stockroom/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (values may come from env vars).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".stockroom").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/stockroom/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StockroomError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            StockroomError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            StockroomError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(StockroomError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// OAuth credentials, each value falling back to its `ZOHO_*` environment
    /// variable.
    pub fn credentials(&self) -> Result<OAuthCredentials> {
        Ok(OAuthCredentials {
            client_id: resolve(&self.client_id, ENV_CLIENT_ID)?,
            client_secret: resolve(&self.client_secret, ENV_CLIENT_SECRET)?,
            refresh_token: resolve(&self.refresh_token, ENV_REFRESH_TOKEN)?,
        })
    }
}

fn resolve(from_file: &Option<String>, env_var: &str) -> Result<String> {
    from_file
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            StockroomError::Configuration(format!(
                "missing secret (set it in secrets.toml or {env_var})"
            ))
        })
}
