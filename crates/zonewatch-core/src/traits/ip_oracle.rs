// # IP Oracle Trait
//
// Defines the interface for discovering the host's public IP address.
//
// ## Implementations
//
// - HTTP IP-echo service: `zonewatch-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use zonewatch_core::IpOracle;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let oracle = /* IpOracle implementation */;
//
//     match oracle.probe().await {
//         Ok(ip) => println!("public IP: {}", ip),
//         Err(e) => println!("probe failed, skipping cycle: {}", e),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// The version of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }
}

/// Trait for IP oracle implementations
///
/// An oracle answers a single question: "what is my public address right
/// now?". It holds no state between calls and never retries.
///
/// # Failure Semantics
///
/// Any network error, non-success status, malformed body or unparsable
/// address is returned as an `Err`. Callers treat an `Err` as "no change
/// detected this cycle", never as a fatal condition.
///
/// # Timeouts
///
/// Implementations must bound every request with a timeout so a hung
/// endpoint cannot stall the reconciler indefinitely.
#[async_trait]
pub trait IpOracle: Send + Sync {
    /// Probe the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The address reported by the oracle
    /// - `Err(Error)`: The probe failed for any reason
    async fn probe(&self) -> Result<IpAddr, crate::Error>;

    /// Oracle name (for logging/debugging)
    fn oracle_name(&self) -> &'static str;
}
