use std::path::Path;

use rusqlite::{params, Connection, Error as RusqliteError, OpenFlags};
use thiserror::Error;
use tracing::{error, info};

use crate::conversion::MAX_PHRASE_LEN;
use crate::zhuyin::Syllable;

use super::{update_freq, StoreError, UpdateAction, UserDictionary, UserPhrase};

#[derive(Debug, Error)]
pub enum SqliteUserDictionaryError {
    #[error("sqlite error")]
    Sqlite(#[from] RusqliteError),
}

impl From<RusqliteError> for StoreError {
    fn from(source: RusqliteError) -> StoreError {
        StoreError::Backend(Box::new(source))
    }
}

/// A user phrase store backed by a transactional local database.
///
/// The schema keeps one row per (phone sequence, phrase) pair. Phone columns
/// beyond the sequence length hold zero so the composite primary key stays
/// total.
pub struct SqliteUserDictionary {
    conn: Connection,
    lifetime: u64,
}

impl SqliteUserDictionary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SqliteUserDictionary, SqliteUserDictionaryError> {
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    pub fn open_read_only<P: AsRef<Path>>(
        path: P,
    ) -> Result<SqliteUserDictionary, SqliteUserDictionaryError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let lifetime = Self::read_lifetime(&conn)?;
        Ok(SqliteUserDictionary { conn, lifetime })
    }

    pub fn open_in_memory() -> Result<SqliteUserDictionary, SqliteUserDictionaryError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<SqliteUserDictionary, SqliteUserDictionaryError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS userphrase_v1 (
                time INTEGER,
                user_freq INTEGER,
                max_freq INTEGER,
                orig_freq INTEGER,
                length INTEGER,
                phone_0 INTEGER,
                phone_1 INTEGER,
                phone_2 INTEGER,
                phone_3 INTEGER,
                phone_4 INTEGER,
                phone_5 INTEGER,
                phone_6 INTEGER,
                phone_7 INTEGER,
                phone_8 INTEGER,
                phone_9 INTEGER,
                phone_10 INTEGER,
                phrase TEXT,
                PRIMARY KEY (
                    phone_0, phone_1, phone_2, phone_3, phone_4, phone_5,
                    phone_6, phone_7, phone_8, phone_9, phone_10, phrase
                )
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS config_v1 (
                id INTEGER PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO config_v1 (id, value) VALUES (0, 0)",
            [],
        )?;
        let lifetime = Self::read_lifetime(&conn)?;
        Ok(SqliteUserDictionary { conn, lifetime })
    }

    fn read_lifetime(conn: &Connection) -> Result<u64, RusqliteError> {
        let value: i64 = conn
            .query_row("SELECT value FROM config_v1 WHERE id = 0", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);
        Ok(value as u64)
    }

    fn phones(syllables: &[Syllable]) -> [u16; MAX_PHRASE_LEN] {
        let mut phones = [0; MAX_PHRASE_LEN];
        for (slot, syl) in phones.iter_mut().zip(syllables) {
            *slot = syl.to_u16();
        }
        phones
    }

    fn row_to_phrase(row: &rusqlite::Row<'_>) -> Result<UserPhrase, RusqliteError> {
        let last_used: i64 = row.get("time")?;
        Ok(UserPhrase {
            phrase: row.get("phrase")?,
            user_freq: row.get("user_freq")?,
            orig_freq: row.get("orig_freq")?,
            max_freq: row.get("max_freq")?,
            last_used: last_used as u64,
        })
    }
}

impl UserDictionary for SqliteUserDictionary {
    fn phrases_for(&self, syllables: &[Syllable]) -> Vec<UserPhrase> {
        if syllables.len() > MAX_PHRASE_LEN {
            return vec![];
        }
        let p = Self::phones(syllables);
        let mut stmt = match self.conn.prepare_cached(
            "SELECT phrase, user_freq, orig_freq, max_freq, time FROM userphrase_v1
                WHERE phone_0 = ? AND phone_1 = ? AND phone_2 = ? AND phone_3 = ?
                  AND phone_4 = ? AND phone_5 = ? AND phone_6 = ? AND phone_7 = ?
                  AND phone_8 = ? AND phone_9 = ? AND phone_10 = ?
                ORDER BY user_freq DESC, phrase ASC",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("user phrase query failed: {e}");
                return vec![];
            }
        };
        let rows = stmt.query_map(
            params![p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10]],
            Self::row_to_phrase,
        );
        match rows {
            Ok(rows) => rows.filter_map(|row| row.ok()).collect(),
            Err(e) => {
                error!("user phrase query failed: {e}");
                vec![]
            }
        }
    }

    fn lookup(&self, syllables: &[Syllable], phrase: &str) -> Option<UserPhrase> {
        if syllables.len() > MAX_PHRASE_LEN {
            return None;
        }
        let p = Self::phones(syllables);
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT phrase, user_freq, orig_freq, max_freq, time FROM userphrase_v1
                    WHERE phone_0 = ? AND phone_1 = ? AND phone_2 = ? AND phone_3 = ?
                      AND phone_4 = ? AND phone_5 = ? AND phone_6 = ? AND phone_7 = ?
                      AND phone_8 = ? AND phone_9 = ? AND phone_10 = ? AND phrase = ?",
            )
            .ok()?;
        stmt.query_row(
            params![
                p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10], phrase
            ],
            Self::row_to_phrase,
        )
        .ok()
    }

    fn upsert(
        &mut self,
        syllables: &[Syllable],
        phrase: &str,
        orig_freq: u32,
        max_freq: u32,
        now: u64,
    ) -> Result<UpdateAction, StoreError> {
        if syllables.is_empty() || syllables.len() > MAX_PHRASE_LEN || phrase.is_empty() {
            return Err(StoreError::InvalidInput);
        }
        let (action, orig_freq, user_freq) = match self.lookup(syllables, phrase) {
            Some(existing) => (
                UpdateAction::Modified,
                existing.orig_freq,
                update_freq(
                    existing.user_freq,
                    max_freq,
                    existing.orig_freq,
                    now.saturating_sub(existing.last_used),
                ),
            ),
            None => (UpdateAction::Inserted, orig_freq, orig_freq),
        };
        let p = Self::phones(syllables);
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO userphrase_v1 (
                time, user_freq, max_freq, orig_freq, length,
                phone_0, phone_1, phone_2, phone_3, phone_4, phone_5,
                phone_6, phone_7, phone_8, phone_9, phone_10, phrase
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.execute(params![
            now as i64,
            user_freq,
            max_freq,
            orig_freq,
            syllables.len() as i64,
            p[0],
            p[1],
            p[2],
            p[3],
            p[4],
            p[5],
            p[6],
            p[7],
            p[8],
            p[9],
            p[10],
            phrase
        ])?;
        info!(
            "userphrase {phrase}, orig_freq = {orig_freq}, max_freq = {max_freq}, \
             user_freq = {user_freq}, recent_time = {now}"
        );
        Ok(action)
    }

    fn remove(&mut self, syllables: &[Syllable], phrase: &str) -> Result<(), StoreError> {
        if syllables.is_empty() || syllables.len() > MAX_PHRASE_LEN {
            return Err(StoreError::InvalidInput);
        }
        let p = Self::phones(syllables);
        let mut stmt = self.conn.prepare_cached(
            "DELETE FROM userphrase_v1
                WHERE phone_0 = ? AND phone_1 = ? AND phone_2 = ? AND phone_3 = ?
                  AND phone_4 = ? AND phone_5 = ? AND phone_6 = ? AND phone_7 = ?
                  AND phone_8 = ? AND phone_9 = ? AND phone_10 = ? AND phrase = ?",
        )?;
        let affected = stmt.execute(params![
            p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10], phrase
        ])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn entries(&self) -> Vec<(Vec<Syllable>, String)> {
        let mut stmt = match self.conn.prepare_cached(
            "SELECT length, phone_0, phone_1, phone_2, phone_3, phone_4, phone_5,
                    phone_6, phone_7, phone_8, phone_9, phone_10, phrase
                FROM userphrase_v1 ORDER BY rowid",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!("user phrase enumeration failed: {e}");
                return vec![];
            }
        };
        let rows = stmt.query_map([], |row| {
            let length: i64 = row.get(0)?;
            let length = length.clamp(0, MAX_PHRASE_LEN as i64) as usize;
            let mut syllables = vec![];
            for i in 0..length {
                let phone: u16 = row.get(1 + i)?;
                if let Ok(syllable) = Syllable::try_from(phone) {
                    if !syllable.is_empty() {
                        syllables.push(syllable);
                    }
                }
            }
            let phrase: String = row.get(12)?;
            Ok((syllables, phrase))
        });
        match rows {
            Ok(rows) => rows.filter_map(|row| row.ok()).collect(),
            Err(e) => {
                error!("user phrase enumeration failed: {e}");
                vec![]
            }
        }
    }

    fn begin(&mut self) {
        if let Err(e) = self.conn.execute_batch("BEGIN") {
            error!("cannot begin user phrase transaction: {e}");
        }
    }

    fn end(&mut self) {
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            error!("cannot commit user phrase transaction: {e}");
        }
    }

    fn lifetime(&self) -> u64 {
        self.lifetime
    }

    fn bump_lifetime(&mut self) -> u64 {
        self.lifetime += 1;
        if let Err(e) = self.conn.execute(
            "UPDATE config_v1 SET value = ? WHERE id = 0",
            params![self.lifetime as i64],
        ) {
            error!("cannot persist lifetime: {e}");
        }
        self.lifetime
    }
}
