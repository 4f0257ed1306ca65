use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meterline_core::{
    MeterError, MeterResult, PendingConfirmation, ReadingRecord, ReadingRepository, ReadingStatus,
    ResponseIntent,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id            TEXT PRIMARY KEY,
        message_sid   TEXT NOT NULL,
        sender        TEXT NOT NULL,
        message       TEXT NOT NULL,
        meter_type    TEXT NOT NULL,
        meter_number  TEXT,
        media_urls    TEXT NOT NULL,
        reading       REAL,
        confidence    REAL NOT NULL,
        ocr_results   TEXT NOT NULL,
        intent        TEXT NOT NULL,
        status        TEXT NOT NULL,
        timestamp     TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_readings_sender ON readings(sender);
    CREATE INDEX IF NOT EXISTS idx_readings_timestamp ON readings(timestamp);
    CREATE TABLE IF NOT EXISTS pending_confirmations (
        sender      TEXT PRIMARY KEY,
        record_id   TEXT NOT NULL,
        value       REAL NOT NULL,
        confidence  REAL NOT NULL,
        created_at  TEXT NOT NULL
    );";

const SELECT_READING: &str = "SELECT id, message_sid, sender, message, meter_type, meter_number,
        media_urls, reading, confidence, ocr_results, intent, status, timestamp
     FROM readings";

/// SQLite-backed store for reading records and the confirmation handshake.
///
/// Statements run on the blocking thread pool.
pub struct SqliteReadingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReadingStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL")?;
        let store = Self::init(conn)?;
        info!(path = %path.as_ref().display(), "Reading store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize readings schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| anyhow!("readings connection lock poisoned"))?;
            op(&mut conn)
        })
        .await
        .context("Store task panicked")?
    }

    /// Most recent readings first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ReadingRecord>> {
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_READING} ORDER BY timestamp DESC LIMIT ?1"))?;
            let rows = stmt.query_map(params![limit as i64], row_to_columns)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(columns_to_record(row?)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ReadingRecord>> {
        self.blocking(move |conn| {
            let columns = conn
                .query_row(
                    &format!("{SELECT_READING} WHERE id = ?1"),
                    params![id.to_string()],
                    row_to_columns,
                )
                .optional()?;
            columns.map(columns_to_record).transpose()
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

fn storage_err(e: impl std::fmt::Display) -> MeterError {
    MeterError::Storage(e.to_string())
}

/// Raw column values of one `readings` row.
struct ReadingColumns {
    id: String,
    message_sid: String,
    sender: String,
    message: String,
    meter_type: String,
    meter_number: Option<String>,
    media_urls: String,
    reading: Option<f64>,
    confidence: f64,
    ocr_results: String,
    intent: String,
    status: String,
    timestamp: String,
}

fn row_to_columns(row: &Row<'_>) -> rusqlite::Result<ReadingColumns> {
    Ok(ReadingColumns {
        id: row.get(0)?,
        message_sid: row.get(1)?,
        sender: row.get(2)?,
        message: row.get(3)?,
        meter_type: row.get(4)?,
        meter_number: row.get(5)?,
        media_urls: row.get(6)?,
        reading: row.get(7)?,
        confidence: row.get(8)?,
        ocr_results: row.get(9)?,
        intent: row.get(10)?,
        status: row.get(11)?,
        timestamp: row.get(12)?,
    })
}

fn columns_to_record(c: ReadingColumns) -> Result<ReadingRecord> {
    let intent: ResponseIntent = serde_json::from_value(serde_json::Value::String(c.intent))
        .context("Unknown intent in readings row")?;
    let status = ReadingStatus::parse(&c.status)
        .with_context(|| format!("Unknown status in readings row: {}", c.status))?;
    Ok(ReadingRecord {
        id: Uuid::parse_str(&c.id)?,
        message_sid: c.message_sid,
        sender: c.sender,
        message: c.message,
        meter_type: c.meter_type,
        meter_number: c.meter_number,
        media_urls: serde_json::from_str(&c.media_urls)?,
        reading: c.reading,
        confidence: c.confidence,
        ocr_results: serde_json::from_str(&c.ocr_results)?,
        intent,
        status,
        timestamp: DateTime::parse_from_rfc3339(&c.timestamp)?.with_timezone(&Utc),
    })
}

fn intent_str(intent: ResponseIntent) -> MeterResult<String> {
    serde_json::to_value(intent)
        .map_err(storage_err)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MeterError::Storage("intent did not serialize to a string".into()))
}

#[async_trait]
impl ReadingRepository for SqliteReadingStore {
    async fn save(&self, record: &ReadingRecord) -> MeterResult<()> {
        let media_urls = serde_json::to_string(&record.media_urls).map_err(storage_err)?;
        let ocr_results = serde_json::to_string(&record.ocr_results).map_err(storage_err)?;
        let intent = intent_str(record.intent)?;
        let record = record.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO readings (id, message_sid, sender, message, meter_type, meter_number,
                     media_urls, reading, confidence, ocr_results, intent, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id.to_string(),
                    record.message_sid,
                    record.sender,
                    record.message,
                    record.meter_type,
                    record.meter_number,
                    media_urls,
                    record.reading,
                    record.confidence,
                    ocr_results,
                    intent,
                    record.status.as_str(),
                    record.timestamp.to_rfc3339(),
                ],
            )?;
            debug!(id = %record.id, status = record.status.as_str(), "Saved reading record");
            Ok(())
        })
        .await
        .map_err(storage_err)
    }

    async fn set_status(&self, id: Uuid, status: ReadingStatus) -> MeterResult<()> {
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE readings SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )?;
            if updated == 0 {
                return Err(anyhow!("no reading with id {id}"));
            }
            Ok(())
        })
        .await
        .map_err(storage_err)
    }

    async fn arm_confirmation(&self, pending: &PendingConfirmation) -> MeterResult<()> {
        let pending = pending.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pending_confirmations (sender, record_id, value, confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    pending.sender,
                    pending.record_id.to_string(),
                    pending.value,
                    pending.confidence,
                    pending.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(storage_err)
    }

    async fn take_confirmation(&self, sender: &str) -> MeterResult<Option<PendingConfirmation>> {
        let sender = sender.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let row: Option<(String, f64, f64, String)> = tx
                .query_row(
                    "SELECT record_id, value, confidence, created_at
                     FROM pending_confirmations WHERE sender = ?1",
                    params![sender],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            let Some((record_id, value, confidence, created_at)) = row else {
                return Ok(None);
            };
            tx.execute(
                "DELETE FROM pending_confirmations WHERE sender = ?1",
                params![sender],
            )?;
            tx.commit()?;

            Ok(Some(PendingConfirmation {
                sender,
                record_id: Uuid::parse_str(&record_id)?,
                value,
                confidence,
                created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            }))
        })
        .await
        .map_err(storage_err)
    }
}
