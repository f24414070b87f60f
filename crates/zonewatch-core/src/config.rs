//! Configuration types for zonewatch
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them (environment, files) is the embedding application's job.

use serde::{Deserialize, Serialize};

use crate::traits::IpVersion;

/// Main zonewatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZonewatchConfig {
    /// IP oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// DNS backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Record cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Refresher settings
    #[serde(default)]
    pub refresher: RefresherConfig,
}

impl ZonewatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.oracle.validate()?;
        self.backend.validate()?;
        self.cache.validate()?;
        self.reconciler.validate()?;
        self.refresher.validate()?;
        Ok(())
    }
}

/// IP oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// IP-echo endpoint returning `{ "ip": "<address>" }`
    #[serde(default = "default_oracle_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,

    /// Only accept addresses of this version (None = either)
    #[serde(default)]
    pub ip_version: Option<IpVersion>,
}

impl OracleConfig {
    /// Validate the oracle configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("IP oracle URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP oracle URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP oracle timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: default_oracle_url(),
            timeout_secs: default_oracle_timeout_secs(),
            ip_version: None,
        }
    }
}

/// DNS backend configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Cloudflare DNS
    Cloudflare {
        /// API token with Zone:Read and DNS:Edit permissions
        api_token: String,
        /// Zone that receives upserts
        zone_id: String,
        /// Request timeout in seconds
        #[serde(default = "default_backend_timeout_secs")]
        timeout_secs: u64,
        /// Perform reads only, log intended writes
        #[serde(default)]
        dry_run: bool,
    },
}

impl BackendConfig {
    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BackendConfig::Cloudflare {
                api_token,
                zone_id,
                timeout_secs,
                ..
            } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("DNS backend timeout must be > 0"));
                }
                Ok(())
            }
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            BackendConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Cloudflare {
            api_token: String::new(),
            zone_id: String::new(),
            timeout_secs: default_backend_timeout_secs(),
            dry_run: false,
        }
    }
}

// Keeps the API token out of logs
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::Cloudflare {
                zone_id,
                timeout_secs,
                dry_run,
                ..
            } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("zone_id", zone_id)
                .field("timeout_secs", timeout_secs)
                .field("dry_run", dry_run)
                .finish(),
        }
    }
}

/// Record cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the JSON cache file
    #[serde(default = "default_cache_path")]
    pub path: String,
}

impl CacheConfig {
    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.is_empty() {
            return Err(crate::Error::config("Cache path cannot be empty"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Delay between probes (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// TTL advertised on upserted records
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Consecutive probes that must report the same new address before the
    /// change is acted on
    ///
    /// 1 acts on the first differing probe.
    #[serde(default = "default_change_confirmations")]
    pub change_confirmations: u32,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.change_confirmations == 0 {
            return Err(crate::Error::config("Change confirmations must be >= 1"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            ttl: default_ttl(),
            change_confirmations: default_change_confirmations(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Refresher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefresherConfig {
    /// Delay between snapshots (in seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,

    /// Take a snapshot immediately instead of waiting one full interval
    #[serde(default)]
    pub refresh_on_start: bool,
}

impl RefresherConfig {
    /// Validate the refresher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval_secs(),
            refresh_on_start: false,
        }
    }
}

fn default_oracle_url() -> String {
    "https://api64.ipify.org?format=json".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    10
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_cache_path() -> String {
    "route53_records.json".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_ttl() -> u32 {
    crate::traits::DEFAULT_TTL
}

fn default_change_confirmations() -> u32 {
    1
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_refresh_interval_secs() -> u64 {
    3600
}
