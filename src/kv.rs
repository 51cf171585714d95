// Key-value byte stores backing the collection

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persistence collaborator: whole payloads stored under string keys
pub trait KvStore {
    /// Read the payload stored under `key`, `None` if nothing was ever saved
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the payload stored under `key`
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if key.starts_with('.') || !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
        return Err(eyre!(
            "Invalid storage key: {} (must be alphanumeric with _/-/.)",
            key
        ));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// Volatile store, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, e.g. with a payload from elsewhere
    pub fn with_entry(mut self, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(key.to_string(), bytes.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl KvStore for MemoryKv {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ============================================================================
// Directory of JSON files
// ============================================================================

/// One `<key>.json` file per key inside a data directory.
///
/// Writes land in a temp file that is synced and renamed over the target
/// under an exclusive lock, so readers see either the old or the new payload.
#[derive(Debug)]
pub struct FileKv {
    base_path: PathBuf,
}

impl FileKv {
    /// Open or create a file store rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create data directory")?;

        let store = Self { base_path };
        store.create_gitignore()?;
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, ".lock\n*.tmp\n").context("Failed to write .gitignore")?;
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    fn lock_file(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open lock file")
    }
}

impl KvStore for FileKv {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let lock = self.lock_file()?;
        FileExt::lock_shared(&lock).context("Failed to acquire shared lock")?;

        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(file = ?path, len = bytes.len(), "Loaded payload");

        // Lock is released when `lock` is dropped
        Ok(Some(bytes))
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let lock = self.lock_file()?;
        FileExt::lock_exclusive(&lock).context("Failed to acquire file lock")?;

        let result = write_replace(&tmp_path, &path, bytes);
        if result.is_err() && tmp_path.exists() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        debug!(file = ?path, len = bytes.len(), "Saved payload");
        Ok(())
    }
}

fn write_replace(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    {
        let mut tmp = File::create(tmp_path).context("Failed to create temp file")?;
        tmp.write_all(bytes).context("Failed to write payload")?;
        tmp.sync_all()?;
    }
    fs::rename(tmp_path, path).with_context(|| format!("Failed to replace {}", path.display()))
}

// ============================================================================
// SQLite
// ============================================================================

/// Keys and payloads kept in a single SQLite table
pub struct SqliteKv {
    db: Connection,
}

impl SqliteKv {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating kv schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl KvStore for SqliteKv {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, Vec<u8>>(0))
            .optional()
            .context("Failed to read from kv table")?;
        Ok(value)
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, bytes, crate::now_ms()],
        )
        .context("Failed to write to kv table")?;
        tx.commit()?;
        Ok(())
    }
}
