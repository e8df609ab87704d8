//! Configuration management for Hitguard.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{HitguardError, Result};
use crate::http::{KeySource, RateLimitBuilder, RateLimitLayer, DEFAULT_MESSAGE};
use crate::ratelimit::{CountingMode, WindowStore, DEFAULT_MAX_CONNECTIONS, DEFAULT_WINDOW_SECONDS};

/// Prefix for environment overrides, e.g. `HITGUARD__RATE_LIMITING__MAX_CONNECTIONS`.
pub const ENV_PREFIX: &str = "HITGUARD";

/// Main configuration for the Hitguard service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitguardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Hits allowed per window
    #[serde(default = "default_max_connections")]
    pub max_connections: u64,

    /// Counting contract (`compat` or `exact`)
    #[serde(default)]
    pub counting_mode: CountingMode,

    /// How often expired records are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Status code sent to rejected clients
    #[serde(default = "default_status_code")]
    pub status_code: u16,

    /// Body sent to rejected clients
    #[serde(default = "default_message")]
    pub message: String,

    /// Emit `X-RateLimit-*` headers
    #[serde(default = "default_true")]
    pub legacy_headers: bool,

    /// Emit `RateLimit-*` headers
    #[serde(default)]
    pub standard_headers: bool,

    /// Where client keys come from
    #[serde(default)]
    pub key_source: KeySource,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_connections: default_max_connections(),
            counting_mode: CountingMode::default(),
            sweep_interval_secs: default_sweep_interval(),
            status_code: default_status_code(),
            message: default_message(),
            legacy_headers: default_true(),
            standard_headers: false,
            key_source: KeySource::default(),
        }
    }
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_max_connections() -> u64 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_status_code() -> u16 {
    429
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

fn default_true() -> bool {
    true
}

impl RateLimitingConfig {
    /// Build the in-memory store described by this configuration.
    pub fn build_store(&self) -> WindowStore {
        WindowStore::new(self.window_secs, self.max_connections).with_counting_mode(self.counting_mode)
    }

    /// A layer builder carrying every response option from this configuration.
    ///
    /// The store still has to be supplied before building.
    pub fn layer_builder(&self) -> RateLimitBuilder {
        RateLimitLayer::builder()
            .shared_key_generator(self.key_source.generator())
            .status_code(self.status_code)
            .message(self.message.clone())
            .legacy_headers(self.legacy_headers)
            .standard_headers(self.standard_headers)
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl HitguardConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        info!(path = %path, "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| HitguardError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load layered configuration: an optional YAML file, then `HITGUARD__*`
    /// environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(::config::File::from(path).format(::config::FileFormat::Yaml));
        }

        builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| HitguardError::Config(e.to_string()))
    }
}
