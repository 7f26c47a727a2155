use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::certs::CertificateSummary;
use crate::errors::{InspectError, StoreError};
use crate::host::{Host, HostStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hosts (
    hostname TEXT PRIMARY KEY,
    last_checked_at INTEGER,
    expires_at INTEGER,
    issuer TEXT,
    status TEXT NOT NULL DEFAULT 'unknown',
    error_message TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS subscriptions (
    hostname TEXT NOT NULL,
    channel_id TEXT NOT NULL,
    PRIMARY KEY (hostname, channel_id)
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON subscriptions(channel_id);
";

const HOST_COLUMNS: &str =
    "hostname, last_checked_at, expires_at, issuer, status, error_message";

/// Persistence contract for monitored hosts and their subscribers.
///
/// Each call is atomic on its own; nothing spans more than one host.
pub trait HostStore: Send + Sync {
    fn list_hosts(&self) -> Result<Vec<Host>, StoreError>;
    fn get_host(&self, hostname: &str) -> Result<Option<Host>, StoreError>;
    /// Upsert keyed by hostname.
    fn save_host(&self, host: &Host) -> Result<(), StoreError>;
    /// Create-or-fetch. The flag is true when the host did not exist before.
    fn create_host(&self, hostname: &str) -> Result<(Host, bool), StoreError>;
    /// Deletes the host and all of its subscriptions. False if it did not exist.
    fn delete_host(&self, hostname: &str) -> Result<bool, StoreError>;
    /// Applies a check result to the stored host in one read-modify-write.
    /// Returns `None` when the host no longer exists.
    fn record_check(
        &self,
        hostname: &str,
        outcome: &Result<CertificateSummary, InspectError>,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<Host>, StoreError>;

    /// `false` when the pair already exists or the host is not stored.
    fn subscribe(&self, hostname: &str, channel_id: &str) -> Result<bool, StoreError>;
    fn unsubscribe(&self, hostname: &str, channel_id: &str) -> Result<bool, StoreError>;
    fn list_subscribers_for(&self, hostname: &str) -> Result<Vec<String>, StoreError>;
    fn count_subscribers(&self, hostname: &str) -> Result<usize, StoreError>;
    fn list_distinct_channels(&self) -> Result<Vec<String>, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn query_host(conn: &Connection, hostname: &str) -> Result<Option<Host>, StoreError> {
        let sql = format!("SELECT {HOST_COLUMNS} FROM hosts WHERE hostname = ?1");
        let row = conn
            .query_row(&sql, rusqlite::params![hostname], |row| Ok(RawHost::from_row(row)))
            .optional()?;
        match row {
            Some(raw) => Ok(Some(raw?.into_host()?)),
            None => Ok(None),
        }
    }

    fn upsert_host(conn: &Connection, host: &Host) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO hosts (hostname, last_checked_at, expires_at, issuer, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(hostname) DO UPDATE SET
                last_checked_at = excluded.last_checked_at,
                expires_at = excluded.expires_at,
                issuer = excluded.issuer,
                status = excluded.status,
                error_message = excluded.error_message",
            rusqlite::params![
                host.hostname,
                host.last_checked_at.map(|t| t.timestamp()),
                host.expires_at.map(|t| t.timestamp()),
                host.issuer,
                host.status.as_str(),
                host.error_message,
            ],
        )?;
        Ok(())
    }
}

/// Column values as stored, before timestamp and status decoding.
struct RawHost {
    hostname: String,
    last_checked_at: Option<i64>,
    expires_at: Option<i64>,
    issuer: Option<String>,
    status: String,
    error_message: String,
}

impl RawHost {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            hostname: row.get(0)?,
            last_checked_at: row.get(1)?,
            expires_at: row.get(2)?,
            issuer: row.get(3)?,
            status: row.get(4)?,
            error_message: row.get(5)?,
        })
    }

    fn into_host(self) -> Result<Host, StoreError> {
        let status = self.status.parse::<HostStatus>().map_err(StoreError::CorruptRow)?;
        Ok(Host {
            last_checked_at: decode_timestamp(&self.hostname, self.last_checked_at)?,
            expires_at: decode_timestamp(&self.hostname, self.expires_at)?,
            hostname: self.hostname,
            issuer: self.issuer,
            status,
            error_message: self.error_message,
        })
    }
}

fn decode_timestamp(hostname: &str, value: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match value {
        Some(secs) => DateTime::from_timestamp(secs, 0).map(Some).ok_or_else(|| {
            StoreError::CorruptRow(format!("{}: timestamp {} out of range", hostname, secs))
        }),
        None => Ok(None),
    }
}

impl HostStore for SqliteStore {
    fn list_hosts(&self) -> Result<Vec<Host>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {HOST_COLUMNS} FROM hosts ORDER BY hostname");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok(RawHost::from_row(row)))?;

        let mut hosts = Vec::new();
        for row in rows {
            hosts.push(row??.into_host()?);
        }
        Ok(hosts)
    }

    fn get_host(&self, hostname: &str) -> Result<Option<Host>, StoreError> {
        let conn = self.lock()?;
        Self::query_host(&conn, hostname)
    }

    fn save_host(&self, host: &Host) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::upsert_host(&conn, host)
    }

    fn create_host(&self, hostname: &str) -> Result<(Host, bool), StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO hosts (hostname, status, error_message) VALUES (?1, 'unknown', '')",
            rusqlite::params![hostname],
        )?;
        let host = Self::query_host(&conn, hostname)?.ok_or_else(|| {
            StoreError::CorruptRow(format!("{}: missing right after insert", hostname))
        })?;
        Ok((host, inserted == 1))
    }

    fn delete_host(&self, hostname: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM subscriptions WHERE hostname = ?1",
            rusqlite::params![hostname],
        )?;
        let deleted = tx.execute("DELETE FROM hosts WHERE hostname = ?1", rusqlite::params![hostname])?;
        tx.commit()?;
        Ok(deleted == 1)
    }

    fn record_check(
        &self,
        hostname: &str,
        outcome: &Result<CertificateSummary, InspectError>,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<Host>, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let Some(mut host) = Self::query_host(&tx, hostname)? else {
            return Ok(None);
        };
        host.apply_check(outcome, checked_at);
        Self::upsert_host(&tx, &host)?;
        tx.commit()?;
        Ok(Some(host))
    }

    fn subscribe(&self, hostname: &str, channel_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        // No row is written for a host that is gone.
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subscriptions (hostname, channel_id) \
             SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM hosts WHERE hostname = ?1)",
            rusqlite::params![hostname, channel_id],
        )?;
        Ok(inserted == 1)
    }

    fn unsubscribe(&self, hostname: &str, channel_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM subscriptions WHERE hostname = ?1 AND channel_id = ?2",
            rusqlite::params![hostname, channel_id],
        )?;
        Ok(deleted == 1)
    }

    fn list_subscribers_for(&self, hostname: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT channel_id FROM subscriptions WHERE hostname = ?1 ORDER BY channel_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![hostname], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn count_subscribers(&self, hostname: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE hostname = ?1",
            rusqlite::params![hostname],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_distinct_channels(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT channel_id FROM subscriptions ORDER BY channel_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }
}
