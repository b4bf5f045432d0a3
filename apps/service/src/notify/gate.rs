use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, TimeZone};

use crate::store::{OutageRow, Store};

/// Subject line for every dispatched digest.
pub const DIGEST_SUBJECT: &str = "hostwatch detected unavailable host(s)";

/// How the gate interprets the send history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle; every run is eligible to send.
    Once,
    /// Repeating cycles, throttled to one digest per interval.
    Daemon,
}

/// Decides whether a digest goes out now, and what it says.
pub struct NotificationGate {
    store: Arc<dyn Store>,
    email_interval: i64,
    mode: RunMode,
}

impl NotificationGate {
    pub fn new(store: Arc<dyn Store>, email_interval: i64, mode: RunMode) -> Self {
        Self { store, email_interval, mode }
    }

    /// Start of the outage window consulted for both the throttle
    /// decision and digest content. Single-shot runs cover everything
    /// still retained; retention pruning bounds that window to 24h.
    fn window_start(&self, now: i64) -> i64 {
        match self.mode {
            RunMode::Daemon => now - self.email_interval,
            RunMode::Once => 0,
        }
    }

    /// Whether a digest may be dispatched at `now`.
    ///
    /// The very first invocation claims the send slot by writing a
    /// marker before any content exists, so two racing first runs
    /// cannot both pass the gate.
    pub async fn should_notify(&self, now: i64) -> Result<bool> {
        let Some(last_send) = self.store.last_send().await? else {
            self.store.record_send(now).await?;
            return Ok(true);
        };

        match self.mode {
            RunMode::Once => Ok(true),
            RunMode::Daemon => {
                if now - last_send <= self.email_interval {
                    return Ok(false);
                }
                let outages = self.store.outages_since(self.window_start(now)).await?;
                Ok(!outages.is_empty())
            }
        }
    }

    /// Outage rows a digest dispatched at `now` would cover.
    pub async fn outages(&self, now: i64) -> Result<Vec<OutageRow>> {
        self.store.outages_since(self.window_start(now)).await
    }

    /// Digest body covering `rows`. None means there is nothing to
    /// report and the send must be skipped.
    pub fn compose(rows: &[OutageRow]) -> Option<String> {
        if rows.is_empty() {
            return None;
        }

        let mut body = String::from("Following hosts had availability or port errors:\n\n");
        for row in rows {
            body.push_str(&format!("Time: {}\n", format_timestamp(row.timestamp)));
            body.push_str(&format!("\tHost: {}\n", row.host));
            body.push_str(&format!(
                "\tConnection: {} ({}% loss)\n",
                connection_label(row.loss_percent),
                row.loss_percent
            ));
            if !row.failed_ports.is_empty() {
                let ports = row
                    .failed_ports
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                body.push_str(&format!("\tPorts: service on {} is unavailable\n", ports));
            }
            body.push('\n');
        }
        Some(body)
    }
}

/// Label for the ICMP side of an outage. Reflects reachability only: a
/// ports-only outage reads "stable", with the failed ports listed on
/// their own line.
fn connection_label(loss_percent: u8) -> &'static str {
    match loss_percent {
        100 => "unavailable",
        0 => "stable",
        _ => "unstable",
    }
}

fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(datetime) => datetime.format("%d.%m.%Y %H:%M:%S").to_string(),
        _ => timestamp.to_string(),
    }
}
