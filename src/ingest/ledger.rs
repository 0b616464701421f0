use fs2::FileExt;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// The ledger lives inside the source tree, next to the files it tracks.
pub const LEDGER_FILE_NAME: &str = "archivist.sqlite3";

/// Schema statements, replayed in order from the last-applied index.
/// Append new statements for upgrades; never change or reorder existing
/// lines — already-ingested ledgers replay only the tail.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE config (version INTEGER NOT NULL)",
    "INSERT INTO config (version) VALUES (0)",
    "CREATE TABLE media_files (id INTEGER PRIMARY KEY AUTOINCREMENT)",
    "ALTER TABLE media_files ADD COLUMN source_path TEXT",
    "CREATE UNIQUE INDEX media_files_source_path_idx ON media_files (source_path)",
    "ALTER TABLE media_files ADD COLUMN source_mtime REAL",
];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "ledger {path} was touched {age_secs}s ago (min idle {min_idle_secs}s); another run may still be active"
    )]
    Busy {
        path: String,
        age_secs: u64,
        min_idle_secs: u64,
    },
    #[error("ledger lock {path} is held by another process")]
    Locked { path: String },
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only facts about a ledger, for the status command.
#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub entries: u64,
    pub schema_version: usize,
    pub idle_secs: u64,
}

/// Persistent record of which source files have already been ingested,
/// keyed by path with an mtime fingerprint. Holds an exclusive lock on a
/// sidecar file for its whole lifetime, so two runs sharing a ledger
/// cannot interleave writes.
#[derive(Debug)]
pub struct Ledger {
    conn: Connection,
    _lock: fs::File,
}

fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    db_path.with_file_name(name)
}

fn idle_secs(db_path: &Path) -> Option<u64> {
    let modified = fs::metadata(db_path).ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default()
            .as_secs(),
    )
}

impl Ledger {
    /// Open (creating if absent) and migrate the ledger at `db_path`.
    ///
    /// Fails `Busy` when the database file was modified within
    /// `min_idle_secs` — the original cross-run exclusion signal — and
    /// `Locked` when another process holds the sidecar lock, which closes
    /// the race window the idle threshold leaves open.
    pub fn open(db_path: &Path, min_idle_secs: u64) -> Result<Self, LedgerError> {
        if db_path.exists() {
            if let Some(age_secs) = idle_secs(db_path) {
                if age_secs < min_idle_secs {
                    return Err(LedgerError::Busy {
                        path: db_path.display().to_string(),
                        age_secs,
                        min_idle_secs,
                    });
                }
            }
        }

        let lock_file_path = lock_path(db_path);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_file_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked {
                path: lock_file_path.display().to_string(),
            })?;

        let conn = Connection::open(db_path)?;
        let ledger = Self { conn, _lock: lock };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<(), LedgerError> {
        let applied = schema_version(&self.conn).unwrap_or(0);
        if applied >= MIGRATIONS.len() {
            return Ok(());
        }
        for statement in &MIGRATIONS[applied..] {
            self.conn.execute(statement, [])?;
        }
        self.conn
            .execute("UPDATE config SET version = ?1", params![
                MIGRATIONS.len() as i64
            ])?;
        Ok(())
    }

    /// True only when an entry for `source_path` exists with exactly the
    /// supplied mtime. A changed mtime means the file was modified after
    /// its last ingestion and must be treated as unknown.
    pub fn known(&self, source_path: &str, mtime: f64) -> Result<bool, LedgerError> {
        let stored: Option<Option<f64>> = self
            .conn
            .query_row(
                "SELECT source_mtime FROM media_files WHERE source_path = ?1",
                params![source_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.flatten() == Some(mtime))
    }

    /// Upsert: insert the entry or overwrite its stored mtime.
    pub fn record(&self, source_path: &str, mtime: f64) -> Result<(), LedgerError> {
        self.conn.execute(
            "INSERT INTO media_files (source_path, source_mtime) VALUES (?1, ?2)
             ON CONFLICT (source_path) DO UPDATE SET source_mtime = excluded.source_mtime",
            params![source_path, mtime],
        )?;
        Ok(())
    }

    pub fn entry_count(&self) -> Result<u64, LedgerError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM media_files", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn schema_version(conn: &Connection) -> Option<usize> {
    conn.query_row(
        "SELECT version FROM config ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .ok()
    .flatten()
    .map(|version| version.max(0) as usize)
}

/// Inspect an existing ledger without locking or migrating it.
pub fn inspect(db_path: &Path) -> Result<Option<LedgerStats>, LedgerError> {
    if !db_path.exists() {
        return Ok(None);
    }
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let entries: i64 = conn
        .query_row("SELECT COUNT(*) FROM media_files", [], |row| row.get(0))
        .unwrap_or(0);
    Ok(Some(LedgerStats {
        entries: entries.max(0) as u64,
        schema_version: schema_version(&conn).unwrap_or(0),
        idle_secs: idle_secs(db_path).unwrap_or(0),
    }))
}
