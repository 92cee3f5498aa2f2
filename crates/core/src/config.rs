//! Configuration types for the Bulkbuy API
//!
//! Configuration is layered: built-in defaults, then an optional file
//! (YAML, TOML or JSON, picked by extension), then environment variables
//! prefixed with `BULKBUY` using `__` as the section separator, for example
//! `BULKBUY__SERVER__PORT=8080` or `BULKBUY__MODE=development`.

use crate::{BulkbuyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BULKBUY";

/// Runtime mode of the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Request logging and debug error detail enabled
    Development,
    /// Internal error detail withheld from clients
    #[default]
    Production,
}

impl RunMode {
    /// Whether development-only behavior is active
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkbuyConfig {
    /// Runtime mode
    #[serde(default)]
    pub mode: RunMode,
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Per-client request limiting
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Input sanitization settings
    #[serde(default)]
    pub sanitize: SanitizeSettings,
    /// Response compression settings
    #[serde(default)]
    pub compression: CompressionSettings,
    /// Cross-origin resource sharing settings
    #[serde(default)]
    pub cors: CorsSettings,
    /// Persistence settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Privileged account provisioned at startup
    #[serde(default)]
    pub super_admin: SuperAdminSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for BulkbuyConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            server: ServerSettings::default(),
            rate_limit: RateLimitSettings::default(),
            body_limit_bytes: default_body_limit(),
            sanitize: SanitizeSettings::default(),
            compression: CompressionSettings::default(),
            cors: CorsSettings::default(),
            database: DatabaseSettings::default(),
            super_admin: SuperAdminSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Take the client address from the first `X-Forwarded-For` entry
    pub trust_proxy: bool,
    /// Directory served as static content
    pub public_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            trust_proxy: false,
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Rate limiting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum admitted requests per client per window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
    /// Only paths under this prefix are limited
    pub path_prefix: String,
    /// Message returned with 429 responses
    pub message: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60 * 60,
            path_prefix: "/api".to_string(),
            message: "Too many requests from this IP, please try again in an hour!".to_string(),
        }
    }
}

/// Input sanitization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanitizeSettings {
    /// Replacement for prohibited key characters; keys are removed when unset
    pub replace_with: Option<String>,
    /// Query keys allowed to carry repeated values
    #[serde(default)]
    pub query_whitelist: Vec<String>,
}

/// Response compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Whether responses are compressed at all
    pub enabled: bool,
    /// Bodies smaller than this are sent uncompressed
    pub threshold_bytes: usize,
    /// gzip level, 0-9
    pub level: u32,
    /// Larger bodies, or bodies of unknown length, are sent uncompressed
    pub max_buffer_bytes: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: 1024,
            level: 6,
            max_buffer_bytes: 1024 * 1024,
        }
    }
}

/// Cross-origin resource sharing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins; `*` allows any
    pub allow_origins: Vec<String>,
    /// Preflight cache lifetime in seconds
    pub max_age: u64,
    /// Whether credentials may be sent
    pub allow_credentials: bool,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            max_age: 86400,
            allow_credentials: false,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL; the in-memory catalog is used when unset
    #[serde(serialize_with = "serialize_redacted_url")]
    pub url: Option<String>,
    /// Abort startup when the database is unreachable
    pub fail_fast: bool,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            fail_fast: false,
            max_connections: 5,
        }
    }
}

/// Mask the password of a connection URL's userinfo
///
/// `postgres://app:secret@db/bulkbuy` becomes `postgres://app:****@db/bulkbuy`.
/// URLs without a password are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_string();
    };
    let rest = &url[scheme_end..];
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return url.to_string();
    };
    match rest[..at].find(':') {
        Some(colon) => format!(
            "{}{}:****{}",
            &url[..scheme_end],
            &rest[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}

fn serialize_redacted_url<S>(
    url: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match url {
        Some(url) => serializer.serialize_some(&redact_url(url)),
        None => serializer.serialize_none(),
    }
}

/// Privileged account provisioned at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperAdminSettings {
    pub name: String,
    pub email: String,
    /// Bootstrap is skipped when no password is configured
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for SuperAdminSettings {
    fn default() -> Self {
        Self {
            name: "Super Admin".to_string(),
            email: "superadmin@bulkbuy.local".to_string(),
            password: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_body_limit() -> usize {
    10 * 1024
}

impl BulkbuyConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(BulkbuyError::not_found(format!(
                    "Configuration file not found: {:?}",
                    path
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors.allow_origins")
                .with_list_parse_key("sanitize.query_whitelist"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(BulkbuyError::validation(
                "rate_limit.max_requests must be greater than zero",
            ));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(BulkbuyError::validation(
                "rate_limit.window_secs must be greater than zero",
            ));
        }

        if !self.rate_limit.path_prefix.starts_with('/') {
            return Err(BulkbuyError::validation(
                "rate_limit.path_prefix must start with '/'",
            ));
        }

        if self.body_limit_bytes == 0 {
            return Err(BulkbuyError::validation(
                "body_limit_bytes must be greater than zero",
            ));
        }

        if self.compression.max_buffer_bytes < self.compression.threshold_bytes {
            return Err(BulkbuyError::validation(
                "compression.max_buffer_bytes must not be below compression.threshold_bytes",
            ));
        }

        if self.compression.level > 9 {
            return Err(BulkbuyError::validation(
                "compression.level must be between 0 and 9",
            ));
        }

        if let Some(replacement) = &self.sanitize.replace_with {
            if replacement.contains('$') || replacement.contains('.') {
                return Err(BulkbuyError::validation(
                    "sanitize.replace_with must not contain '$' or '.'",
                ));
            }
        }

        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
