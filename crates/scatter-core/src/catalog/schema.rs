use rusqlite::Connection;

use crate::error::Result;

/// Run all migrations on the catalog database.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS provider_configs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            platform    TEXT NOT NULL,
            config      TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS files (
            id                  TEXT PRIMARY KEY,
            filename            TEXT NOT NULL,
            description         TEXT,
            size                INTEGER NOT NULL DEFAULT 0,
            sha256              TEXT,
            encryption_key      BLOB NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            provider_config_id  INTEGER NOT NULL REFERENCES provider_configs(id),
            storage_context     TEXT NOT NULL DEFAULT '{}',
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id         TEXT NOT NULL REFERENCES files(id),
            chunk_order     INTEGER NOT NULL,
            size_plain      INTEGER NOT NULL,
            size_encrypted  INTEGER NOT NULL DEFAULT 0,
            chunk_ref       TEXT,
            status          TEXT NOT NULL DEFAULT 'pending',
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(file_id, chunk_order)
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id, chunk_order);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"provider_configs".to_string()));
        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"chunks".to_string()));
    }

    #[test]
    fn migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }
}
