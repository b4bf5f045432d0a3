use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::lookup_host;

use super::checker::{PingChecker, PortChecker};
use super::types::{ProbeError, ProbeResult};
use crate::config::{HostSpec, ProbeSettings};

/// Source of probe results; the only seam the orchestrator sees.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &HostSpec) -> Result<ProbeResult, ProbeError>;
}

/// Live network prober: ICMP echo first, then TCP connects to the
/// configured ports when the host answered cleanly.
pub struct ProbeRunner {
    ping: PingChecker,
    ports: PortChecker,
}

impl ProbeRunner {
    pub fn new(settings: &ProbeSettings) -> Result<Self> {
        let ping = PingChecker::new(
            settings.icmp_count,
            Duration::from_secs(settings.icmp_timeout_seconds),
        )
        .context("failed to create ICMP client (raw sockets may require elevated privileges)")?;

        Ok(Self { ping, ports: PortChecker::new(Duration::from_secs(settings.port_timeout_seconds)) })
    }

    async fn resolve(&self, address: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addrs: Vec<IpAddr> = lookup_host((address, 0u16))
            .await
            .map_err(|err| ProbeError::Resolution {
                address: address.to_string(),
                reason: err.to_string(),
            })?
            .map(|sock| sock.ip())
            .collect();

        addrs
            .iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| addrs.first().copied())
            .ok_or_else(|| ProbeError::Resolution {
                address: address.to_string(),
                reason: "no addresses returned".to_string(),
            })
    }
}

#[async_trait]
impl Prober for ProbeRunner {
    async fn probe(&self, host: &HostSpec) -> Result<ProbeResult, ProbeError> {
        let ip = self.resolve(&host.address).await?;
        let loss_percent = self.ping.check(ip).await;

        // An unreachable host implies unreachable services; ports are
        // only tested when ICMP came back clean.
        let failed_ports = if loss_percent == 0 && !host.ports.is_empty() {
            self.ports.failed_ports(&host.address, &host.ports).await
        } else {
            Vec::new()
        };

        Ok(ProbeResult { loss_percent, failed_ports })
    }
}
