use std::path::Path;

use rusqlite::{Connection, params};

use crate::error::{Result, ScatterError};
use crate::types::{
    ChunkRecord, ChunkRef, ChunkStatus, FileKey, FileRecord, FileStatus, Platform,
    ProviderConfigRecord, StorageContext,
};

/// High-level interface for catalog database operations.
///
/// The catalog is the narrow persistence port of the system: files, chunks,
/// and provider configurations. Everything else talks to this struct, never
/// to SQLite directly.
pub struct CatalogDb {
    conn: Connection,
}

impl CatalogDb {
    /// Open (or create) the catalog database and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        super::schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Provider configs ───────────────────────────────────────

    pub fn insert_provider_config(
        &self,
        name: &str,
        platform: Platform,
        config: &serde_json::Value,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO provider_configs (name, platform, config) VALUES (?1, ?2, ?3)",
            params![name, platform.to_string(), config.to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_provider_config(&self, name: &str) -> Result<ProviderConfigRecord> {
        self.conn
            .query_row(
                "SELECT id, name, platform, config, created_at FROM provider_configs WHERE name=?1",
                params![name],
                provider_config_from_row,
            )
            .map_err(|_| ScatterError::ProviderNotFound(name.to_string()))
    }

    pub fn get_provider_config_by_id(&self, id: i64) -> Result<ProviderConfigRecord> {
        self.conn
            .query_row(
                "SELECT id, name, platform, config, created_at FROM provider_configs WHERE id=?1",
                params![id],
                provider_config_from_row,
            )
            .map_err(|_| ScatterError::ProviderNotFound(format!("id {id}")))
    }

    pub fn list_provider_configs(&self) -> Result<Vec<ProviderConfigRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, platform, config, created_at FROM provider_configs ORDER BY name",
        )?;
        let rows = stmt.query_map([], provider_config_from_row)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Whether any file still references this provider configuration.
    pub fn provider_config_in_use(&self, id: i64) -> Result<bool> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE provider_config_id=?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a provider config by name. Refused while files reference it.
    pub fn delete_provider_config(&self, name: &str) -> Result<()> {
        let cfg = self.get_provider_config(name)?;
        if self.provider_config_in_use(cfg.id)? {
            return Err(ScatterError::Config(format!(
                "provider config '{name}' is still referenced by existing files"
            )));
        }
        self.conn.execute(
            "DELETE FROM provider_configs WHERE id=?1",
            params![cfg.id],
        )?;
        Ok(())
    }

    // ── Files ──────────────────────────────────────────────────

    pub fn create_file(
        &self,
        id: &str,
        filename: &str,
        description: Option<&str>,
        key: &FileKey,
        provider_config_id: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO files (id, filename, description, encryption_key, provider_config_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                filename,
                description,
                key.as_bytes().as_slice(),
                provider_config_id
            ],
        )?;
        Ok(())
    }

    pub fn get_file(&self, id: &str) -> Result<FileRecord> {
        self.conn
            .query_row(
                "SELECT id, filename, description, size, sha256, encryption_key, status,
                        provider_config_id, storage_context, created_at
                 FROM files WHERE id=?1",
                params![id],
                file_from_row,
            )
            .map_err(|_| ScatterError::FileNotFound(id.to_string()))
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, description, size, sha256, encryption_key, status,
                    provider_config_id, storage_context, created_at
             FROM files ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn set_file_status(&self, id: &str, status: FileStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET status=?2 WHERE id=?1",
            params![id, status.to_string()],
        )?;
        Ok(())
    }

    pub fn set_storage_context(&self, id: &str, context: &StorageContext) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET storage_context=?2 WHERE id=?1",
            params![id, context.0.to_string()],
        )?;
        Ok(())
    }

    /// Record the final size and signature and mark the file completed.
    pub fn complete_file(&self, id: &str, size: u64, sha256: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET status='completed', size=?2, sha256=?3 WHERE id=?1",
            params![id, size, sha256],
        )?;
        Ok(())
    }

    /// Remove the file row. Callers must have removed the chunks first —
    /// the file row is always the last record to go.
    pub fn delete_file_record(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM files WHERE id=?1", params![id])?;
        Ok(())
    }

    // ── Chunks ─────────────────────────────────────────────────

    /// Insert a pending chunk row before the provider upload.
    pub fn insert_chunk_pending(
        &self,
        file_id: &str,
        chunk_order: u32,
        size_plain: u64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chunks (file_id, chunk_order, size_plain) VALUES (?1, ?2, ?3)",
            params![file_id, chunk_order, size_plain],
        )?;
        Ok(())
    }

    /// Promote a chunk to stored once the provider confirmed receipt and a
    /// reference is in hand.
    pub fn mark_chunk_stored(
        &self,
        file_id: &str,
        chunk_order: u32,
        chunk_ref: &ChunkRef,
        size_encrypted: u64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE chunks SET status='stored', chunk_ref=?3, size_encrypted=?4
             WHERE file_id=?1 AND chunk_order=?2",
            params![
                file_id,
                chunk_order,
                chunk_ref.0.to_string(),
                size_encrypted
            ],
        )?;
        Ok(())
    }

    pub fn mark_chunk_failed(&self, file_id: &str, chunk_order: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE chunks SET status='failed' WHERE file_id=?1 AND chunk_order=?2",
            params![file_id, chunk_order],
        )?;
        Ok(())
    }

    /// All chunks of a file in ascending order.
    pub fn list_chunks(&self, file_id: &str) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, chunk_order, size_plain, size_encrypted, chunk_ref, status
             FROM chunks WHERE file_id=?1 ORDER BY chunk_order",
        )?;
        let rows = stmt.query_map(params![file_id], chunk_from_row)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn delete_chunk_record(&self, file_id: &str, chunk_order: u32) -> Result<()> {
        self.conn.execute(
            "DELETE FROM chunks WHERE file_id=?1 AND chunk_order=?2",
            params![file_id, chunk_order],
        )?;
        Ok(())
    }

    // ── Stats ──────────────────────────────────────────────────

    /// Catalog totals: (files, chunks, plaintext bytes, encrypted bytes).
    pub fn stats(&self) -> Result<(u64, u64, u64, u64)> {
        let files: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let (chunks, plain, encrypted): (u64, u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_plain),0), COALESCE(SUM(size_encrypted),0) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok((files, chunks, plain, encrypted))
    }
}

fn provider_config_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProviderConfigRecord> {
    Ok(ProviderConfigRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        platform: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(Platform::Local),
        config: serde_json::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(serde_json::Value::Null),
        created_at: row.get(4)?,
    })
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let key_bytes: Vec<u8> = row.get(5)?;
    let key = FileKey::from_slice(&key_bytes).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Blob,
            "encryption key must be 32 bytes".into(),
        )
    })?;
    Ok(FileRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        description: row.get(2)?,
        size: row.get(3)?,
        sha256: row.get(4)?,
        key,
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(FileStatus::Failed),
        provider_config_id: row.get(7)?,
        storage_context: StorageContext(
            serde_json::from_str(&row.get::<_, String>(8)?)
                .unwrap_or_else(|_| serde_json::json!({})),
        ),
        created_at: row.get(9)?,
    })
}

fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        file_id: row.get(0)?,
        chunk_order: row.get(1)?,
        size_plain: row.get(2)?,
        size_encrypted: row.get(3)?,
        chunk_ref: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .map(ChunkRef),
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(ChunkStatus::Failed),
    })
}
