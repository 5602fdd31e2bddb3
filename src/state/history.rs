use chrono::Utc;
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::data::ImageRef;

/// One produced try-on image
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    /// Person image used for the run (empty when imported from disk)
    pub person_path: String,
    /// Garment image used for the run (empty when imported from disk)
    pub garment_path: String,
    pub output_path: String,
    /// Unix timestamp of the last time this output was written
    pub created_at: i64,
}

/// The TryOnHistory manages the SQLite catalog of composited outputs.
/// It feeds the "Output Images" gallery across restarts.
pub struct TryOnHistory {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl TryOnHistory {
    /// Open (or create) the catalog at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> SqlResult<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)?;

        log::info!("📁 History database at: {}", db_path.display());

        let mut history = TryOnHistory {
            conn,
            db_path: Some(db_path),
        };
        history.init_schema()?;
        Ok(history)
    }

    /// In-memory catalog, used when no data directory is available and in tests
    pub fn open_in_memory() -> SqlResult<Self> {
        let mut history = TryOnHistory {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        history.init_schema()?;
        Ok(history)
    }

    /// Default location of the catalog file:
    /// - Linux: ~/.local/share/ai-personal-shopper/history.db
    /// - macOS: ~/Library/Application Support/ai-personal-shopper/history.db
    /// - Windows: %APPDATA%\ai-personal-shopper\history.db
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("ai-personal-shopper");
        path.push("history.db");
        Some(path)
    }

    fn init_schema(&mut self) -> SqlResult<()> {
        // Re-running the same pair overwrites the same output file,
        // so the output path is the natural key
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                person_path     TEXT NOT NULL,
                garment_path    TEXT NOT NULL,
                output_path     TEXT NOT NULL UNIQUE,
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_runs_created_at
             ON runs(created_at DESC)",
            [],
        )?;

        Ok(())
    }

    #[cfg(test)]
    pub fn count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
    }

    /// Record a successful run. An existing row for the same output is
    /// refreshed rather than duplicated.
    pub fn record(&self, person: &ImageRef, garment: &ImageRef, output: &ImageRef) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO runs (person_path, garment_path, output_path, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(output_path) DO UPDATE SET
                person_path = excluded.person_path,
                garment_path = excluded.garment_path,
                created_at = excluded.created_at",
            params![
                person.path().to_string_lossy(),
                garment.path().to_string_lossy(),
                output.path().to_string_lossy(),
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Most recent outputs first
    pub fn recent(&self, limit: usize) -> SqlResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_path, garment_path, output_path, created_at
             FROM runs ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                person_path: row.get(1)?,
                garment_path: row.get(2)?,
                output_path: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        rows.collect()
    }

    /// Catalog `.png` files already sitting in the output directory
    /// (e.g. produced before the catalog existed). Returns how many were added.
    pub fn import_existing(&self, output_dir: &Path) -> SqlResult<usize> {
        let mut imported = 0;

        for entry in WalkDir::new(output_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_png = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("png"))
                .unwrap_or(false);
            if !is_png {
                continue;
            }

            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| chrono::DateTime::<Utc>::from(t).timestamp())
                .unwrap_or_else(|| Utc::now().timestamp());

            let added = self.conn.execute(
                "INSERT OR IGNORE INTO runs (person_path, garment_path, output_path, created_at)
                 VALUES ('', '', ?1, ?2)",
                params![path.to_string_lossy(), modified],
            )?;
            imported += added;
        }

        if imported > 0 {
            log::info!("🖼️  Imported {} existing outputs into history", imported);
        }
        Ok(imported)
    }

    /// Drop rows whose output file no longer exists on disk
    pub fn prune_missing(&self) -> SqlResult<usize> {
        let mut stmt = self.conn.prepare("SELECT id, output_path FROM runs")?;

        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        let mut removed = 0;
        for (id, output_path) in rows {
            if !Path::new(&output_path).exists() {
                self.conn
                    .execute("DELETE FROM runs WHERE id = ?1", params![id])?;
                removed += 1;
            }
        }

        if removed > 0 {
            log::warn!("⚠️  Removed {} history entries with missing files", removed);
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for TryOnHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnHistory")
            .field("db_path", &self.db_path)
            .finish()
    }
}
