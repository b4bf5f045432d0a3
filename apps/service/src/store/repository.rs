use anyhow::Result;
use async_trait::async_trait;
use libsql::{Connection, params};

use super::models::{OutageRow, StatusRecord, join_ports, split_ports};

/// Storage interface for the status time series and the send log. The
/// store exclusively owns both tables; every write commits immediately.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append one status record. No deduplication: repeated identical
    /// records are all kept, this is a time series.
    async fn append_status(&self, record: &StatusRecord) -> Result<()>;

    /// Append one entry to the send log.
    async fn record_send(&self, timestamp: i64) -> Result<()>;

    /// Most recent send-log entry, or None if the log is empty.
    async fn last_send(&self) -> Result<Option<i64>>;

    /// Distinct DOWN rows newer than `since`, in storage order.
    async fn outages_since(&self, since: i64) -> Result<Vec<OutageRow>>;

    /// Delete all rows older than `cutoff` from both tables. Idempotent.
    async fn prune(&self, cutoff: i64) -> Result<()>;

    /// Destroy all persisted rows in both tables.
    async fn reset(&self) -> Result<()>;
}

/// LibSQL-backed store implementation.
pub struct StoreImpl {
    conn: Connection,
}

impl StoreImpl {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub(crate) async fn count_status_rows(&self) -> Result<i64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM host_status", ()).await?;
        let row = rows.next().await?.expect("count query returns one row");
        Ok(row.get(0)?)
    }

    #[cfg(test)]
    pub(crate) async fn count_send_rows(&self) -> Result<i64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM sendings", ()).await?;
        let row = rows.next().await?.expect("count query returns one row");
        Ok(row.get(0)?)
    }
}

#[async_trait]
impl Store for StoreImpl {
    async fn append_status(&self, record: &StatusRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO host_status (timestamp, host, address, state, loss, failed_ports) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.timestamp,
                    record.host.clone(),
                    record.address.clone(),
                    record.state.as_i64(),
                    record.loss_percent as i64,
                    join_ports(&record.failed_ports)
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_send(&self, timestamp: i64) -> Result<()> {
        self.conn
            .execute("INSERT INTO sendings (timestamp) VALUES (?)", params![timestamp])
            .await?;
        Ok(())
    }

    async fn last_send(&self) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query("SELECT timestamp FROM sendings ORDER BY timestamp DESC LIMIT 1", ())
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    async fn outages_since(&self, since: i64) -> Result<Vec<OutageRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT timestamp, host, loss, failed_ports FROM host_status \
                 WHERE timestamp > ? AND state = 0",
            )
            .await?;

        let mut rows = stmt.query(params![since]).await?;
        let mut outages = Vec::new();

        while let Some(row) = rows.next().await? {
            let raw_ports: String = row.get(3)?;
            outages.push(OutageRow {
                timestamp: row.get(0)?,
                host: row.get(1)?,
                loss_percent: row.get::<i64>(2)? as u8,
                failed_ports: split_ports(&raw_ports),
            });
        }

        Ok(outages)
    }

    async fn prune(&self, cutoff: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM host_status WHERE timestamp < ?", params![cutoff])
            .await?;
        self.conn
            .execute("DELETE FROM sendings WHERE timestamp < ?", params![cutoff])
            .await?;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.conn.execute("DELETE FROM host_status", ()).await?;
        self.conn.execute("DELETE FROM sendings", ()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::HostState;
    use crate::store::initialize_database;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(StoreImpl, TempDir)> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("test.db");

        let db = libsql::Builder::new_local(&db_path).build().await?;
        let conn = db.connect()?;
        initialize_database(&conn).await?;

        Ok((StoreImpl::new(conn), dir))
    }

    fn down_record(timestamp: i64, host: &str, loss: u8, ports: Vec<u16>) -> StatusRecord {
        StatusRecord {
            timestamp,
            host: host.into(),
            address: "10.0.0.1".into(),
            state: HostState::Down,
            loss_percent: loss,
            failed_ports: ports,
        }
    }

    fn up_record(timestamp: i64, host: &str) -> StatusRecord {
        StatusRecord {
            timestamp,
            host: host.into(),
            address: "10.0.0.1".into(),
            state: HostState::Up,
            loss_percent: 0,
            failed_ports: vec![],
        }
    }

    #[tokio::test]
    async fn outage_query_returns_down_rows_only() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append_status(&up_record(1000, "healthy")).await?;
        store.append_status(&down_record(1001, "broken", 100, vec![])).await?;
        store.append_status(&down_record(1002, "ports", 0, vec![443, 8080])).await?;

        let outages = store.outages_since(0).await?;
        assert_eq!(outages.len(), 2);
        assert!(outages.iter().all(|row| row.host != "healthy"));

        let ports_row = outages.iter().find(|row| row.host == "ports").unwrap();
        assert_eq!(ports_row.failed_ports, vec![443, 8080]);
        Ok(())
    }

    #[tokio::test]
    async fn outage_windows_are_monotonic() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        for timestamp in [100, 200, 300] {
            store.append_status(&down_record(timestamp, "broken", 100, vec![])).await?;
        }

        let wide = store.outages_since(50).await?;
        let narrow = store.outages_since(250).await?;

        assert_eq!(wide.len(), 3);
        assert_eq!(narrow.len(), 1);
        for row in &narrow {
            assert!(wide.contains(row), "narrow window row missing from wide window");
        }
        Ok(())
    }

    #[tokio::test]
    async fn identical_records_are_all_kept() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let record = down_record(100, "broken", 100, vec![]);
        store.append_status(&record).await?;
        store.append_status(&record).await?;

        assert_eq!(store.count_status_rows().await?, 2);
        // DISTINCT collapses them in the outage view.
        assert_eq!(store.outages_since(0).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn prune_is_idempotent() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append_status(&down_record(100, "old", 100, vec![])).await?;
        store.append_status(&down_record(500, "recent", 100, vec![])).await?;
        store.record_send(100).await?;
        store.record_send(500).await?;

        store.prune(400).await?;
        assert_eq!(store.count_status_rows().await?, 1);
        assert_eq!(store.count_send_rows().await?, 1);

        store.prune(400).await?;
        assert_eq!(store.count_status_rows().await?, 1);
        assert_eq!(store.count_send_rows().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn last_send_is_most_recent() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        assert_eq!(store.last_send().await?, None);

        store.record_send(100).await?;
        store.record_send(300).await?;
        store.record_send(200).await?;

        assert_eq!(store.last_send().await?, Some(300));
        Ok(())
    }

    #[tokio::test]
    async fn reset_clears_both_tables() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append_status(&down_record(100, "broken", 100, vec![])).await?;
        store.record_send(100).await?;

        store.reset().await?;
        assert_eq!(store.count_status_rows().await?, 0);
        assert_eq!(store.count_send_rows().await?, 0);
        assert_eq!(store.last_send().await?, None);
        Ok(())
    }
}
