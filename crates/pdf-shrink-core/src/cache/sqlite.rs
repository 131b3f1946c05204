use super::SizeStore;
use crate::error::Error;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable `path -> size` store in a single SQLite table.
pub struct SqliteSizeStore {
    conn: Connection,
}

impl SqliteSizeStore {
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = SqliteSizeStore { conn };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        debug!("Using '{}' for processed file cache", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteSizeStore { conn };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode)");
        Ok(())
    }

    fn migrate_schema(&self) -> rusqlite::Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS processed_file (
                     path       TEXT PRIMARY KEY NOT NULL,
                     size_bytes INTEGER NOT NULL
                 );
                 PRAGMA user_version = 1;",
            )?;
            debug!("Processed file cache schema initialized (version 1)");
        }
        Ok(())
    }
}

impl SizeStore for SqliteSizeStore {
    fn load_all(&mut self) -> Result<HashMap<PathBuf, u64>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, size_bytes FROM processed_file")?;
        let rows = stmt.query_map([], |row| {
            let path: String = row.get(0)?;
            let size: i64 = row.get(1)?;
            Ok((PathBuf::from(path), size.max(0) as u64))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (path, size) = row?;
            map.insert(path, size);
        }
        Ok(map)
    }

    fn put(&mut self, path: &Path, size_bytes: u64) -> Result<(), Error> {
        self.conn.execute(
            "INSERT INTO processed_file (path, size_bytes) VALUES (?1, ?2) \
             ON CONFLICT(path) DO UPDATE SET size_bytes = excluded.size_bytes",
            params![path.to_string_lossy(), size_bytes as i64],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.conn.execute("DELETE FROM processed_file", [])?;
        Ok(())
    }
}
