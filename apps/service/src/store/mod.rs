//! Persistent status history and send log.
//!
//! Two append-only tables back the watchdog: the per-host status time
//! series and the digest send log. Both are pruned under the same
//! retention horizon at the start of every cycle.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{HostState, OutageRow, StatusRecord};
pub use repository::{Store, StoreImpl};

use anyhow::Result;

/// Horizon beyond which status and send history is discarded.
pub const RETENTION_SECONDS: i64 = 24 * 3600;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
