//! SQLite-backed journal of submitted edit batches.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    edit::{BATCH_FORMAT_VERSION, EditBatch},
    types::EditKind,
};

use super::{EditSink, SubmitError, SubmitResult};

/// SQLite implementation of [`crate::submit::EditSink`].
pub struct SqliteEditSink {
    conn: Connection,
}

impl SqliteEditSink {
    /// Opens or creates a journal at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> SubmitResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory journal.
    pub fn open_in_memory() -> SubmitResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> SubmitResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// All journaled batches, oldest first.
    pub fn load_batches(&self) -> SubmitResult<Vec<EditBatch>> {
        let mut stmt = self.conn.prepare("SELECT payload FROM batches ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_batch_payload(&row?)?);
        }
        Ok(out)
    }

    /// Number of journaled batches.
    pub fn batch_count(&self) -> SubmitResult<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// History cursor covered by the most recent batch.
    pub fn latest_through_index(&self) -> SubmitResult<Option<usize>> {
        let idx: Option<i64> = self
            .conn
            .query_row("SELECT through_index FROM batches ORDER BY id DESC LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(idx.map(|v| v as usize))
    }

    /// Edit kinds journaled for one feature, oldest first.
    pub fn feature_kinds(&self, layer: u32, feature_id: &str) -> SubmitResult<Vec<EditKind>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind FROM edits WHERE layer_id = ?1 AND feature_id = ?2 ORDER BY batch_id ASC, pos ASC",
        )?;
        let rows = stmt.query_map(params![layer, feature_id], |row| row.get::<_, i64>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(kind_from_code(row?)?);
        }
        Ok(out)
    }
}

impl EditSink for SqliteEditSink {
    fn submit(&mut self, batch: &EditBatch) -> SubmitResult<()> {
        let payload = serde_json::to_vec(batch)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO batches(ts_ms, through_index, payload) VALUES (?1, ?2, ?3)",
            params![now_ms() as i64, batch.through_index as i64, payload],
        )?;
        let batch_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO edits(batch_id, pos, kind, layer_id, feature_id) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (pos, edit) in batch.edits.iter().enumerate() {
                stmt.execute(params![
                    batch_id,
                    pos as i64,
                    kind_code(edit.kind()),
                    edit.layer(),
                    edit.feature_id().to_string(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(batch_id, edits = batch.len(), "batch journaled");
        Ok(())
    }

    fn flush(&mut self) -> SubmitResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn kind_code(kind: EditKind) -> i64 {
    match kind {
        EditKind::Create => 1,
        EditKind::Update => 2,
        EditKind::Delete => 3,
    }
}

fn kind_from_code(code: i64) -> SubmitResult<EditKind> {
    match code {
        1 => Ok(EditKind::Create),
        2 => Ok(EditKind::Update),
        3 => Ok(EditKind::Delete),
        other => Err(SubmitError::Message(format!("unknown edit kind code {other}"))),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn decode_batch_payload(payload: &[u8]) -> SubmitResult<EditBatch> {
    let batch: EditBatch = serde_json::from_slice(payload)?;
    if batch.format_version != BATCH_FORMAT_VERSION {
        return Err(SubmitError::Message(format!(
            "unsupported batch format version: {}",
            batch.format_version
        )));
    }
    Ok(batch)
}
