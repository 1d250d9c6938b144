//! Configuration types for bulk-load

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

/// Default address of the document store service
pub const DEFAULT_FORWARDER_URL: &str = "http://localhost:8087";

/// Default bulk-import sub-path on the document store
pub const DEFAULT_IMPORT_PATH: &str = "/api/rest/v1/google-sheet/bulk-import";

/// Default number of documents per forwarded batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default upload size limit in megabytes
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;

/// Prefix for all crate-specific environment variables
const ENV_PREFIX: &str = "BULK_LOAD_";

/// Outbound document store settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Base address of the document store (default: "http://localhost:8087")
    #[serde(default = "default_forwarder_url")]
    pub base_url: String,

    /// Sub-path of the bulk-import endpoint
    #[serde(default = "default_import_path")]
    pub import_path: String,

    /// Timeout for one bulk-import call (default: 60 seconds)
    #[serde(default = "default_forward_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Key naming used for the client fields of the payload
    #[serde(default)]
    pub payload_keys: PayloadKeys,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            base_url: default_forwarder_url(),
            import_path: default_import_path(),
            timeout: default_forward_timeout(),
            payload_keys: PayloadKeys::default(),
        }
    }
}

impl ForwarderConfig {
    /// Full bulk-import URL (`base_url` joined with `import_path`)
    pub fn import_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.import_path.trim_start_matches('/')
        )
    }
}

/// Naming of the client identifier fields in the bulk-import payload
///
/// `data` is always sent as `data`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKeys {
    /// `client_id` / `business_name`
    #[default]
    SnakeCase,
    /// `clientId` / `businessName`
    CamelCase,
}

impl PayloadKeys {
    /// Keys for the client identifier and business name, in that order
    pub fn keys(&self) -> (&'static str, &'static str) {
        match self {
            PayloadKeys::SnakeCase => ("client_id", "business_name"),
            PayloadKeys::CamelCase => ("clientId", "businessName"),
        }
    }
}

impl std::str::FromStr for PayloadKeys {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snake_case" | "snake" => Ok(PayloadKeys::SnakeCase),
            "camel_case" | "camel" | "camelcase" => Ok(PayloadKeys::CamelCase),
            other => Err(Error::Config {
                message: format!("unknown payload key style '{other}'"),
                key: Some(format!("{ENV_PREFIX}PAYLOAD_KEYS")),
            }),
        }
    }
}

/// File processing limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum documents per batch (default: 10000)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum accepted upload size in megabytes (default: 100)
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl ProcessingConfig {
    /// Size limit in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:8088)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for the bulk loader
///
/// - [`forwarder`](ForwarderConfig): where and how batches are sent
/// - [`processing`](ProcessingConfig): batch size and upload limits
/// - [`server`](ServerIntegrationConfig): REST API settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Outbound document store
    #[serde(default)]
    pub forwarder: ForwarderConfig,

    /// Batch size and upload limits
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// API server
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from a `.env` file, the environment, and defaults
    ///
    /// Recognized variables (crate-prefixed names win over the short forms):
    ///
    /// | variable | field |
    /// |---|---|
    /// | `BULK_LOAD_FORWARDER_URL`, `IG_DB_MONGO_URL` | `forwarder.base_url` |
    /// | `BULK_LOAD_IMPORT_PATH` | `forwarder.import_path` |
    /// | `BULK_LOAD_FORWARD_TIMEOUT_SECS` | `forwarder.timeout` |
    /// | `BULK_LOAD_PAYLOAD_KEYS` | `forwarder.payload_keys` |
    /// | `BULK_LOAD_BATCH_SIZE`, `BATCH_SIZE` | `processing.batch_size` |
    /// | `BULK_LOAD_MAX_FILE_SIZE_MB`, `MAX_FILE_SIZE_MB` | `processing.max_file_size_mb` |
    /// | `BULK_LOAD_BIND_ADDRESS` | `server.api.bind_address` |
    /// | `BULK_LOAD_CORS_ORIGINS` (comma separated) | `server.api.cors_origins` |
    /// | `BULK_LOAD_SWAGGER_UI` | `server.api.swagger_ui` |
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Some(url) = env_var("FORWARDER_URL", Some("IG_DB_MONGO_URL")) {
            config.forwarder.base_url = url;
        }
        if let Some(path) = env_var("IMPORT_PATH", None) {
            config.forwarder.import_path = path;
        }
        if let Some(secs) = parse_env::<u64>("FORWARD_TIMEOUT_SECS", None)? {
            config.forwarder.timeout = Duration::from_secs(secs);
        }
        if let Some(keys) = env_var("PAYLOAD_KEYS", None) {
            config.forwarder.payload_keys = keys.parse()?;
        }
        if let Some(size) = parse_env::<usize>("BATCH_SIZE", Some("BATCH_SIZE"))? {
            config.processing.batch_size = size;
        }
        if let Some(mb) = parse_env::<u64>("MAX_FILE_SIZE_MB", Some("MAX_FILE_SIZE_MB"))? {
            config.processing.max_file_size_mb = mb;
        }
        if let Some(addr) = parse_env::<SocketAddr>("BIND_ADDRESS", None)? {
            config.server.api.bind_address = addr;
        }
        if let Some(origins) = env_var("CORS_ORIGINS", None) {
            config.server.api.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(enabled) = parse_env::<bool>("SWAGGER_UI", None)? {
            config.server.api.swagger_ui = enabled;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.processing.batch_size == 0 {
            return Err(Error::Config {
                message: "batch size must be greater than 0".into(),
                key: Some("batch_size".into()),
            });
        }

        if self.processing.max_file_size_mb == 0 {
            return Err(Error::Config {
                message: "maximum file size must be greater than 0".into(),
                key: Some("max_file_size_mb".into()),
            });
        }

        if self.forwarder.timeout.is_zero() {
            return Err(Error::Config {
                message: "forward timeout must be greater than 0".into(),
                key: Some("forwarder.timeout".into()),
            });
        }

        url::Url::parse(&self.forwarder.base_url).map_err(|e| Error::Config {
            message: format!("invalid forwarder URL '{}': {e}", self.forwarder.base_url),
            key: Some("forwarder.base_url".into()),
        })?;

        Ok(())
    }
}

/// Read `BULK_LOAD_{name}`, falling back to an unprefixed alias
fn env_var(name: &str, alias: Option<&str>) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .or_else(|| alias.and_then(|a| std::env::var(a).ok()))
        .filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, alias: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name, alias) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| Error::Config {
            message: format!("invalid value '{raw}': {e}"),
            key: Some(format!("{ENV_PREFIX}{name}")),
        }),
        None => Ok(None),
    }
}

fn default_forwarder_url() -> String {
    DEFAULT_FORWARDER_URL.to_string()
}

fn default_import_path() -> String {
    DEFAULT_IMPORT_PATH.to_string()
}

fn default_forward_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_file_size_mb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_MB
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8088))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
