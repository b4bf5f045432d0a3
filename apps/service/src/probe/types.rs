use thiserror::Error;

/// A probe that could not run at all, as opposed to one that ran and
/// observed failures. The affected host still gets a status record for
/// the cycle; the caller decides how (see the orchestrator).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to resolve {address}: {reason}")]
    Resolution { address: String, reason: String },
}

/// Raw outcome of probing one host in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// ICMP packet loss, 0-100.
    pub loss_percent: u8,
    /// Configured ports that did not accept a connection. Always empty
    /// when `loss_percent` is nonzero, since port testing is skipped
    /// for unreachable hosts.
    pub failed_ports: Vec<u16>,
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        self.loss_percent == 0 && self.failed_ports.is_empty()
    }
}
