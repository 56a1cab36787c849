//! Chat session store
//!
//! Persists one row per chat. The conversation is kept as a JSON document
//! in the `messages` column so a chat is always written as a whole.

mod schema;

pub use schema::*;

use crate::chat::Conversation;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored conversation is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("Chat {chatid} is owned by another user")]
    OwnerMismatch { chatid: String },
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Last issued timestamp (microseconds); keeps write stamps strictly increasing
    clock: Arc<AtomicI64>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(schema::SCHEMA)?;
        let latest: Option<i64> =
            conn.query_row("SELECT MAX(timestamp) FROM chats", [], |row| row.get(0))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(AtomicI64::new(latest.unwrap_or(0))),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    // ==================== Chat Operations ====================

    /// Insert or replace a chat, keyed by `(userid, chatid)`.
    ///
    /// The stored timestamp is refreshed on every call. Writing a chat id
    /// that already belongs to another user is not acknowledged.
    pub fn upsert_chat(
        &self,
        summary: &ChatSummary,
        messages: &Conversation,
    ) -> DbResult<ChatSummary> {
        let messages_json = serde_json::to_string(messages)?;
        let conn = self.conn()?;
        let stamp = self.next_timestamp();

        let written = conn.execute(
            "INSERT INTO chats (chatid, userid, ticker, quarter, year, timestamp, messages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(chatid) DO UPDATE SET
                ticker = excluded.ticker,
                quarter = excluded.quarter,
                year = excluded.year,
                timestamp = excluded.timestamp,
                messages = excluded.messages
             WHERE chats.userid = excluded.userid",
            params![
                summary.chatid,
                summary.userid,
                summary.ticker,
                summary.quarter,
                summary.year,
                stamp,
                messages_json
            ],
        )?;

        if written == 0 {
            return Err(DbError::OwnerMismatch {
                chatid: summary.chatid.clone(),
            });
        }

        Ok(ChatSummary {
            timestamp: from_micros(stamp),
            ..summary.clone()
        })
    }

    /// Get a chat with its full conversation
    pub fn get_chat(&self, chatid: &str) -> DbResult<Chat> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT userid, chatid, ticker, quarter, year, timestamp, messages
                 FROM chats WHERE chatid = ?1",
                params![chatid],
                |row| Ok((summary_from_row(row)?, row.get::<_, String>(6)?)),
            )
            .optional()?;
        drop(conn);

        let (summary, messages_json) = row.ok_or_else(|| DbError::ChatNotFound(chatid.to_string()))?;
        Ok(Chat {
            summary,
            messages: serde_json::from_str(&messages_json)?,
        })
    }

    /// Get chat metadata without loading the conversation
    pub fn get_chat_summary(&self, chatid: &str) -> DbResult<ChatSummary> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT userid, chatid, ticker, quarter, year, timestamp
             FROM chats WHERE chatid = ?1",
            params![chatid],
            summary_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ChatNotFound(chatid.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// List a user's chats, most recently modified first
    pub fn list_chats_for_user(&self, userid: &str) -> DbResult<Vec<ChatSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT userid, chatid, ticker, quarter, year, timestamp
             FROM chats WHERE userid = ?1
             ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map(params![userid], summary_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSummary> {
    Ok(ChatSummary {
        userid: row.get(0)?,
        chatid: row.get(1)?,
        ticker: row.get(2)?,
        quarter: row.get(3)?,
        year: row.get(4)?,
        timestamp: from_micros(row.get(5)?),
    })
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}
