//! Cycle coordination: prune, probe, persist, notify.
//!
//! The orchestrator owns the three-phase cycle (probe all hosts, then
//! decide, then notify) and the single-flight guarantee of the
//! repeating loop. Probing and delivery sit behind the [`Prober`] and
//! [`Transport`] seams.


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::notify::{DIGEST_SUBJECT, NotificationGate, RunMode, Transport};
use crate::probe::Prober;
use crate::store::{HostState, RETENTION_SECONDS, StatusRecord, Store};

pub struct Orchestrator {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    prober: Arc<dyn Prober>,
    transport: Arc<dyn Transport>,
    gate: NotificationGate,
    in_flight: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        prober: Arc<dyn Prober>,
        transport: Arc<dyn Transport>,
        mode: RunMode,
    ) -> Self {
        let gate =
            NotificationGate::new(store.clone(), config.schedule.email_interval_seconds, mode);
        Self { config, store, prober, transport, gate, in_flight: AtomicBool::new(false) }
    }

    /// One full cycle at `now`: prune expired history, probe every
    /// host, persist exactly one record each, then decide and dispatch
    /// the digest. A per-host probe failure never blocks the other
    /// hosts; it yields the unreachable sentinel record instead.
    pub async fn run_cycle(&self, now: i64) -> Result<()> {
        self.store.prune(now - RETENTION_SECONDS).await?;

        for host in &self.config.hosts {
            info!("checking {}", host.name);
            let record = match self.prober.probe(host).await {
                Ok(probe) => StatusRecord::evaluate(host, &probe, now),
                Err(err) => {
                    warn!("probe failed for {}: {}", host.name, err);
                    StatusRecord::unreachable(host, now)
                }
            };
            log_outcome(&record);
            self.store.append_status(&record).await?;
        }

        self.dispatch_digest(now).await
    }

    async fn dispatch_digest(&self, now: i64) -> Result<()> {
        if !self.gate.should_notify(now).await? {
            return Ok(());
        }

        let outages = self.gate.outages(now).await?;
        let Some(body) = NotificationGate::compose(&outages) else {
            return Ok(());
        };

        info!("{} invalid host record(s) found, sending digest", outages.len());
        match self.transport.send(DIGEST_SUBJECT, &body).await {
            // The send marker is written only once delivery succeeded.
            Ok(()) => self.store.record_send(now).await?,
            Err(err) => {
                warn!("digest delivery failed, will retry next eligible cycle: {}", err);
            }
        }
        Ok(())
    }

    /// One cycle at the current wall-clock time. Store failures
    /// propagate; in single-shot mode that becomes a nonzero exit.
    pub async fn run_once(&self) -> Result<()> {
        self.run_cycle(Utc::now().timestamp()).await
    }

    /// Repeating loop: run a cycle, sleep the configured gap, repeat.
    /// Cycle errors are logged and the loop continues. The latch is a
    /// check-and-skip guard: a tick that would overlap a still-running
    /// cycle is dropped, never queued.
    pub async fn run_forever(&self) {
        let interval = Duration::from_secs(self.config.schedule.check_interval_seconds);
        loop {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                warn!("previous cycle still running, skipping this tick");
            } else {
                if let Err(err) = self.run_once().await {
                    error!("check cycle failed: {:#}", err);
                }
                self.in_flight.store(false, Ordering::SeqCst);
            }

            info!("sleeping for {} seconds", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
    }
}

fn log_outcome(record: &StatusRecord) {
    match record.state {
        HostState::Up => info!("{} = GOOD", record.host),
        HostState::Down if record.loss_percent == 100 => {
            warn!("{} = BAD - not available (100% loss)", record.host);
        }
        HostState::Down if record.loss_percent > 0 => {
            warn!("{} = BAD - unstable ({}% loss)", record.host, record.loss_percent);
        }
        HostState::Down => {
            for port in &record.failed_ports {
                warn!("{} = BAD - service on port {} is not reachable", record.host, port);
            }
        }
    }
}
