//! Durable session state backed by SQLite.
//!
//! A small key-value table holds the broadcast tournament, the opaque auth
//! token and the username. A missing key means "not signed in" or "no
//! tournament yet" and is never an error.

use crate::error::RemoteResult;
use chesslink_types::BroadcastTournament;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const KEY_TOURNAMENT: &str = "tournament";
const KEY_AUTH_STATE: &str = "auth_state";
const KEY_USERNAME: &str = "username";

/// Stored credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub username: String,
}

/// Persistent key-value store for session state.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Opens (or creates) a session store at the given path.
    pub fn open(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> RemoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> RemoteResult<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> RemoteResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM session WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> RemoteResult<()> {
        self.conn().execute(
            "INSERT INTO session (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Tournament ───────────────────────────────────────────────

    /// Loads the persisted broadcast tournament.
    pub fn tournament(&self) -> RemoteResult<Option<BroadcastTournament>> {
        match self.get(KEY_TOURNAMENT)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_tournament(&self, tournament: &BroadcastTournament) -> RemoteResult<()> {
        debug!(id = %tournament.id, "persisting broadcast tournament");
        self.put(KEY_TOURNAMENT, &serde_json::to_string(tournament)?)
    }

    // ── Credentials ──────────────────────────────────────────────

    /// Returns the stored credentials, if both token and username are present.
    pub fn credentials(&self) -> RemoteResult<Option<Credentials>> {
        let token = self.get(KEY_AUTH_STATE)?;
        let username = self.get(KEY_USERNAME)?;
        Ok(token
            .zip(username)
            .map(|(token, username)| Credentials { token, username }))
    }

    pub fn save_credentials(&self, credentials: &Credentials) -> RemoteResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (key, value) in [
            (KEY_AUTH_STATE, credentials.token.as_str()),
            (KEY_USERNAME, credentials.username.as_str()),
        ] {
            tx.execute(
                "INSERT INTO session (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Forgets the token and username. The tournament is kept.
    pub fn clear_credentials(&self) -> RemoteResult<()> {
        self.conn().execute(
            "DELETE FROM session WHERE key IN (?1, ?2)",
            params![KEY_AUTH_STATE, KEY_USERNAME],
        )?;
        Ok(())
    }

    pub fn is_signed_in(&self) -> RemoteResult<bool> {
        Ok(self.credentials()?.is_some())
    }
}
