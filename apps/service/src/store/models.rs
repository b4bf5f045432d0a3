use crate::config::HostSpec;
use crate::probe::ProbeResult;

/// Host state as persisted: UP = 1, DOWN = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Up,
    Down,
}

impl HostState {
    pub fn as_i64(self) -> i64 {
        match self {
            HostState::Up => 1,
            HostState::Down => 0,
        }
    }
}

/// One appended row of the status time series. Never mutated after
/// insert; exactly one is produced per host per completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub timestamp: i64,
    pub host: String,
    pub address: String,
    pub state: HostState,
    pub loss_percent: u8,
    pub failed_ports: Vec<u16>,
}

impl StatusRecord {
    /// Evaluate a probe outcome into the record appended for this
    /// cycle. UP requires both clean ICMP and every configured port
    /// accepting; anything else is DOWN. Loss 1-99 ("unstable") and
    /// 100 ("unreachable") both map to DOWN, the distinction survives
    /// only in `loss_percent`.
    pub fn evaluate(host: &HostSpec, probe: &ProbeResult, now: i64) -> Self {
        let state = if probe.is_healthy() { HostState::Up } else { HostState::Down };
        Self {
            timestamp: now,
            host: host.name.clone(),
            address: host.address.clone(),
            state,
            loss_percent: probe.loss_percent,
            failed_ports: probe.failed_ports.clone(),
        }
    }

    /// Sentinel record for a host whose probe could not run at all.
    pub fn unreachable(host: &HostSpec, now: i64) -> Self {
        Self {
            timestamp: now,
            host: host.name.clone(),
            address: host.address.clone(),
            state: HostState::Down,
            loss_percent: 100,
            failed_ports: Vec::new(),
        }
    }
}

/// A DOWN row inside the notification window, as consumed by digest
/// composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutageRow {
    pub timestamp: i64,
    pub host: String,
    pub loss_percent: u8,
    pub failed_ports: Vec<u16>,
}

/// Column encoding for failed ports, e.g. "80:443".
pub fn join_ports(ports: &[u16]) -> String {
    ports.iter().map(u16::to_string).collect::<Vec<_>>().join(":")
}

pub fn split_ports(raw: &str) -> Vec<u16> {
    raw.split(':').filter_map(|part| part.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostSpec {
        HostSpec { name: "gateway".into(), address: "192.168.0.1".into(), ports: vec![80, 443] }
    }

    #[test]
    fn clean_probe_evaluates_up() {
        let probe = ProbeResult { loss_percent: 0, failed_ports: vec![] };
        let record = StatusRecord::evaluate(&host(), &probe, 1000);
        assert_eq!(record.state, HostState::Up);
        assert_eq!(record.timestamp, 1000);
    }

    #[test]
    fn any_loss_evaluates_down() {
        for loss in [1, 33, 99, 100] {
            let probe = ProbeResult { loss_percent: loss, failed_ports: vec![] };
            let record = StatusRecord::evaluate(&host(), &probe, 1000);
            assert_eq!(record.state, HostState::Down, "loss {} must be down", loss);
        }
    }

    #[test]
    fn failed_port_evaluates_down_despite_clean_icmp() {
        let probe = ProbeResult { loss_percent: 0, failed_ports: vec![443] };
        let record = StatusRecord::evaluate(&host(), &probe, 1000);
        assert_eq!(record.state, HostState::Down);
        assert_eq!(record.loss_percent, 0);
    }

    #[test]
    fn unreachable_sentinel_is_full_loss() {
        let record = StatusRecord::unreachable(&host(), 1000);
        assert_eq!(record.state, HostState::Down);
        assert_eq!(record.loss_percent, 100);
        assert!(record.failed_ports.is_empty());
    }

    #[test]
    fn port_encoding_roundtrip() {
        assert_eq!(join_ports(&[80, 443]), "80:443");
        assert_eq!(split_ports("80:443"), vec![80, 443]);
        assert_eq!(join_ports(&[]), "");
        assert!(split_ports("").is_empty());
    }
}
