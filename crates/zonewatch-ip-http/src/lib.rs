// # HTTP IP Oracle
//
// This crate provides the HTTP IP-echo oracle for zonewatch.
//
// ## Protocol
//
// One GET per probe against an IP-echo endpoint. The default endpoint
// (`https://api64.ipify.org?format=json`) answers with:
//
// ```json
// { "ip": "203.0.113.7" }
// ```
//
// Endpoints answering with the bare address as plain text are accepted too.
//
// ## Failure Semantics
//
// Network errors, timeouts, non-2xx statuses, malformed bodies, unparsable
// addresses and addresses of the wrong version all surface as
// `Error::IpOracle`. The oracle never retries; the reconciler simply tries
// again next cycle.

use zonewatch_core::config::OracleConfig;
use zonewatch_core::traits::{IpOracle, IpVersion};
use zonewatch_core::{Error, Result};

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Body returned by JSON IP-echo endpoints
#[derive(Debug, Deserialize)]
struct EchoResponse {
    ip: String,
}

/// HTTP IP-echo oracle
#[derive(Debug, Clone)]
pub struct HttpIpOracle {
    /// URL to fetch the address from
    url: String,

    /// Only accept addresses of this version (None = either)
    version: Option<IpVersion>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpOracle {
    /// Create a new HTTP IP oracle
    ///
    /// # Parameters
    ///
    /// - `url`: IP-echo endpoint (e.g., "https://api64.ipify.org?format=json")
    /// - `version`: Address version to accept (None = either)
    /// - `timeout`: Upper bound for each request
    pub fn new(url: impl Into<String>, version: Option<IpVersion>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            version,
            client,
        })
    }

    /// Create an oracle from configuration
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.url.clone(),
            config.ip_version,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Endpoint this oracle queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the current address from the echo service
    async fn fetch_ip(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_oracle(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ip_oracle(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_oracle(format!("Failed to read response: {}", e)))?;

        let ip = parse_body(&body)?;

        if let Some(expected) = self.version {
            if IpVersion::of(&ip) != expected {
                return Err(Error::ip_oracle(format!(
                    "Expected {:?} address, got: {}",
                    expected, ip
                )));
            }
        }

        Ok(ip)
    }
}

/// Extract the address from a JSON `{ "ip": ... }` or plain-text body
fn parse_body(body: &str) -> Result<IpAddr> {
    let body = body.trim();

    let text = if body.starts_with('{') {
        serde_json::from_str::<EchoResponse>(body)
            .map_err(|e| Error::ip_oracle(format!("Malformed oracle response: {}", e)))?
            .ip
    } else {
        body.to_string()
    };

    let text = text.trim();
    text.parse()
        .map_err(|_| Error::ip_oracle(format!("Invalid IP address: {:?}", text)))
}

#[async_trait::async_trait]
impl IpOracle for HttpIpOracle {
    async fn probe(&self) -> Result<IpAddr> {
        let ip = self.fetch_ip().await?;
        tracing::debug!("Oracle {} reported {}", self.url, ip);
        Ok(ip)
    }

    fn oracle_name(&self) -> &'static str {
        "http"
    }
}
