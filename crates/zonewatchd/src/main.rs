// # zonewatchd - Dynamic DNS Updater Daemon
//
// Thin integration layer: all reconciliation logic lives in zonewatch-core.
//
// The zonewatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the IP oracle, the DNS backend and the cache storage
// 4. Running the supervisor until SIGINT/SIGTERM
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### IP Oracle
// - `ZONEWATCH_ORACLE_URL`: IP-echo endpoint (default: https://api64.ipify.org?format=json)
// - `ZONEWATCH_ORACLE_TIMEOUT_SECS`: Request timeout (default: 10)
// - `ZONEWATCH_IP_VERSION`: Accept only `v4` or `v6` addresses (default: either)
//
// ### DNS Backend (Cloudflare)
// - `ZONEWATCH_CLOUDFLARE_API_TOKEN`: API token (required)
// - `ZONEWATCH_ZONE_ID`: Zone receiving upserts (required)
// - `ZONEWATCH_BACKEND_TIMEOUT_SECS`: Request timeout (default: 30)
// - `ZONEWATCH_DRY_RUN`: Log writes instead of performing them (default: false)
//
// ### Record Cache
// - `ZONEWATCH_CACHE_PATH`: JSON cache file (default: route53_records.json)
//
// ### Schedule
// - `ZONEWATCH_POLL_INTERVAL_SECS`: Delay between probes (default: 30)
// - `ZONEWATCH_REFRESH_INTERVAL_SECS`: Delay between snapshots (default: 3600)
// - `ZONEWATCH_REFRESH_ON_START`: Snapshot immediately at startup (default: false)
// - `ZONEWATCH_CHANGE_CONFIRMATIONS`: Probes required to accept a change (default: 1)
// - `ZONEWATCH_TTL`: TTL of upserted records (default: 60)
//
// ### Logging
// - `ZONEWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export ZONEWATCH_CLOUDFLARE_API_TOKEN=your_token
// export ZONEWATCH_ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export ZONEWATCH_CACHE_PATH=/var/lib/zonewatch/records.json
//
// zonewatchd
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use zonewatch_core::config::{BackendConfig, OracleConfig};
use zonewatch_core::traits::IpVersion;
use zonewatch_core::{FileCacheStorage, Supervisor, ZonewatchConfig, ZonewatchEvent};
use zonewatch_ip_http::HttpIpOracle;
use zonewatch_provider_cloudflare::CloudflareBackend;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ZonewatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<ZonewatchExitCode> for ExitCode {
    fn from(code: ZonewatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    zonewatch: ZonewatchConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`
    ///
    /// Unset and empty variables fall back to defaults. Set but unparsable
    /// values are errors.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut zonewatch = ZonewatchConfig::default();

        let oracle_defaults = OracleConfig::default();
        zonewatch.oracle = OracleConfig {
            url: get("ZONEWATCH_ORACLE_URL").unwrap_or(oracle_defaults.url),
            timeout_secs: parse_var(
                &get,
                "ZONEWATCH_ORACLE_TIMEOUT_SECS",
                oracle_defaults.timeout_secs,
            )?,
            ip_version: get("ZONEWATCH_IP_VERSION")
                .map(|v| parse_ip_version(&v))
                .transpose()?,
        };

        zonewatch.backend = BackendConfig::Cloudflare {
            api_token: get("ZONEWATCH_CLOUDFLARE_API_TOKEN").unwrap_or_default(),
            zone_id: get("ZONEWATCH_ZONE_ID").unwrap_or_default(),
            timeout_secs: parse_var(&get, "ZONEWATCH_BACKEND_TIMEOUT_SECS", 30)?,
            dry_run: parse_flag(&get, "ZONEWATCH_DRY_RUN")?,
        };

        if let Some(path) = get("ZONEWATCH_CACHE_PATH") {
            zonewatch.cache.path = path;
        }

        let reconciler = &mut zonewatch.reconciler;
        reconciler.poll_interval_secs = parse_var(
            &get,
            "ZONEWATCH_POLL_INTERVAL_SECS",
            reconciler.poll_interval_secs,
        )?;
        reconciler.change_confirmations = parse_var(
            &get,
            "ZONEWATCH_CHANGE_CONFIRMATIONS",
            reconciler.change_confirmations,
        )?;
        reconciler.ttl = parse_var(&get, "ZONEWATCH_TTL", reconciler.ttl)?;

        let refresher = &mut zonewatch.refresher;
        refresher.interval_secs = parse_var(
            &get,
            "ZONEWATCH_REFRESH_INTERVAL_SECS",
            refresher.interval_secs,
        )?;
        refresher.refresh_on_start = parse_flag(&get, "ZONEWATCH_REFRESH_ON_START")?;

        Ok(Self {
            zonewatch,
            log_level: get("ZONEWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// On top of the library checks this rejects placeholder tokens, a
    /// missing cache directory and unknown log levels.
    fn validate(&self) -> Result<()> {
        if let BackendConfig::Cloudflare { api_token, .. } = &self.zonewatch.backend {
            if api_token.is_empty() {
                anyhow::bail!(
                    "ZONEWATCH_CLOUDFLARE_API_TOKEN is required. \
                    Set it via: export ZONEWATCH_CLOUDFLARE_API_TOKEN=your_token"
                );
            }

            // Check for obvious placeholder tokens (common mistake)
            let token_lower = api_token.to_lowercase();
            if token_lower.contains("your_token")
                || token_lower.contains("replace_me")
                || token_lower == "token"
            {
                anyhow::bail!(
                    "ZONEWATCH_CLOUDFLARE_API_TOKEN appears to be a placeholder. \
                    Use an actual API token from Cloudflare."
                );
            }
        }

        self.zonewatch
            .validate()
            .context("Invalid zonewatch configuration")?;

        if let Some(parent) = std::path::Path::new(&self.zonewatch.cache.path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "ZONEWATCH_CACHE_PATH parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if self.zonewatch.oracle.url.starts_with("http://") {
            eprintln!(
                "WARNING: ZONEWATCH_ORACLE_URL uses HTTP (not HTTPS). \
                      The reported address could be tampered with."
            );
        }

        parse_log_level(&self.log_level)?;
        Ok(())
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<bool> {
    match get(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, v),
        },
    }
}

fn parse_ip_version(value: &str) -> Result<IpVersion> {
    match value.trim().to_lowercase().as_str() {
        "v4" | "4" | "ipv4" => Ok(IpVersion::V4),
        "v6" | "6" | "ipv6" => Ok(IpVersion::V6),
        other => anyhow::bail!("ZONEWATCH_IP_VERSION must be v4 or v6. Got: {}", other),
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "ZONEWATCH_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZonewatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ZonewatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonewatchExitCode::ConfigError.into();
    }

    info!("Starting zonewatchd daemon");
    info!(
        "Backend: {:?}, cache: {}",
        config.zonewatch.backend, config.zonewatch.cache.path
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonewatchExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Build the components and run until shutdown
async fn run_daemon(config: Config) -> ZonewatchExitCode {
    let supervisor = match build_supervisor(&config.zonewatch).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return ZonewatchExitCode::ConfigError;
        }
    };

    info!("Ready to monitor IP changes");
    match supervisor.run().await {
        Ok(()) => {
            info!("Shutting down daemon");
            ZonewatchExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            ZonewatchExitCode::RuntimeError
        }
    }
}

async fn build_supervisor(config: &ZonewatchConfig) -> Result<Supervisor> {
    let oracle = HttpIpOracle::from_config(&config.oracle).context("IP oracle")?;
    info!("IP oracle: {}", oracle.url());

    let backend = CloudflareBackend::from_config(&config.backend).context("DNS backend")?;

    let storage = FileCacheStorage::new(&config.cache.path)
        .await
        .with_context(|| format!("Record cache at {}", config.cache.path))?;

    let (supervisor, mut events) = Supervisor::new(
        Arc::new(oracle),
        Arc::new(backend),
        Arc::new(storage),
        config,
    )?;

    // Drain events so the channel never fills up
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ZonewatchEvent::UpsertFailed {
                    record_name, error, ..
                } => warn!("Event: upsert of {} failed: {}", record_name, error),
                other => debug!("Event: {:?}", other),
            }
        }
    });

    Ok(supervisor)
}
