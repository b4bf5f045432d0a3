use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// ICMP echo checker: sends a fixed number of echo requests and reports
/// how many went unanswered within the per-packet deadline, as an
/// integer loss percentage.
pub struct PingChecker {
    client: PingClient,
    count: u32,
    timeout: Duration,
}

impl PingChecker {
    /// Requires a raw ICMP socket, which may need elevated privileges.
    pub fn new(count: u32, per_packet_timeout: Duration) -> std::io::Result<Self> {
        let client = PingClient::new(&PingConfig::default())?;
        Ok(Self { client, count, timeout: per_packet_timeout })
    }

    /// Packet loss percentage for `ip`, 0-100.
    pub async fn check(&self, ip: IpAddr) -> u8 {
        let payload = [0u8; 56];
        let mut pinger = self.client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let mut unanswered = 0u32;
        for seq in 0..self.count {
            if pinger.ping(PingSequence(seq as u16), &payload).await.is_err() {
                unanswered += 1;
            }
        }
        loss_percent(self.count, unanswered)
    }
}

pub(crate) fn loss_percent(sent: u32, unanswered: u32) -> u8 {
    if sent == 0 {
        return 0;
    }
    ((unanswered * 100) / sent) as u8
}

/// TCP connect checker. Connects to the configured address string
/// directly, so each port test performs its own name resolution.
pub struct PortChecker {
    timeout: Duration,
}

impl PortChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the subset of `ports` that did not accept a connection
    /// within the deadline. Ports are tested independently, in order;
    /// one failure never short-circuits the rest.
    pub async fn failed_ports(&self, address: &str, ports: &[u16]) -> Vec<u16> {
        let mut failed = Vec::new();
        for &port in ports {
            if !self.check(address, port).await {
                failed.push(port);
            }
        }
        failed
    }

    async fn check(&self, address: &str, port: u16) -> bool {
        let target = format!("{}:{}", address, port);
        matches!(timeout(self.timeout, TcpStream::connect(&target)).await, Ok(Ok(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn loss_percent_integer_math() {
        assert_eq!(loss_percent(3, 0), 0);
        assert_eq!(loss_percent(3, 1), 33);
        assert_eq!(loss_percent(3, 2), 66);
        assert_eq!(loss_percent(3, 3), 100);
        assert_eq!(loss_percent(0, 0), 0);
    }

    #[tokio::test]
    async fn open_port_passes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let checker = PortChecker::new(Duration::from_secs(1));
        let failed = checker.failed_ports("127.0.0.1", &[port]).await;
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn closed_port_is_reported_and_does_not_short_circuit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();

        // Grab a port the kernel just released so nothing is listening.
        let closed_port = {
            let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap().port()
        };

        let checker = PortChecker::new(Duration::from_secs(1));
        let failed = checker.failed_ports("127.0.0.1", &[closed_port, open_port]).await;
        assert_eq!(failed, vec![closed_port]);
    }
}
