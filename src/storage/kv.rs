//! Ordered key-value store on top of SQLite
//!
//! The database file holds any number of named buckets. Each bucket maps
//! binary keys to binary values, iterates in byte order of its keys, and owns
//! a monotonically increasing sequence used to mint new keys.
//!
//! ```text
//! buckets(name TEXT PRIMARY KEY, sequence INTEGER)
//! entries(bucket TEXT, key BLOB, value BLOB, PRIMARY KEY (bucket, key))
//! ```
//!
//! SQLite compares blobs with `memcmp`, so `ORDER BY key` is lexicographic
//! byte order. Callers that want numeric order encode integers big-endian
//! (see [`u64_key`]).
//!
//! An exclusive `fs2` lock on `<db>.lock` is held from [`KvStore::open`]
//! until the store is closed or dropped.

use std::fs::{File, OpenOptions};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Database {0} is locked by another process")]
    Locked(PathBuf),

    #[error("Database {path} has unsupported layout version {version}")]
    UnsupportedLayout { path: PathBuf, version: i32 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Encodes a `u64` as an 8-byte big-endian key
pub fn u64_key(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decodes an 8-byte big-endian key, `None` if the length is wrong
pub fn key_u64(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// File-backed store of named, ordered buckets
pub struct KvStore {
    /// Path to the SQLite database
    path: PathBuf,

    /// Database connection
    conn: Connection,

    /// Held for the lifetime of the store
    lock: File,
}

impl KvStore {
    /// Layout version - stored in `PRAGMA user_version`
    const LAYOUT_VERSION: i32 = 1;

    /// Opens the store at `path`, creating the file if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let lock = Self::acquire_lock(&path)?;

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        let mut store = Self { path, conn, lock };
        store.ensure_layout()?;

        Ok(store)
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::lock_path(path))?;

        match lock.try_lock_exclusive() {
            Ok(()) => Ok(lock),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(KvError::Locked(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the tables on a fresh file, rejects files written by an unknown layout
    fn ensure_layout(&mut self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        match version {
            0 => {
                let tx = self.conn.transaction()?;
                tx.execute_batch(
                    "
                    CREATE TABLE IF NOT EXISTS buckets (
                        name TEXT PRIMARY KEY,
                        sequence INTEGER NOT NULL DEFAULT 0
                    );

                    CREATE TABLE IF NOT EXISTS entries (
                        bucket TEXT NOT NULL REFERENCES buckets(name),
                        key BLOB NOT NULL,
                        value BLOB NOT NULL,
                        PRIMARY KEY (bucket, key)
                    ) WITHOUT ROWID;
                    ",
                )?;
                tx.execute(
                    &format!("PRAGMA user_version = {}", Self::LAYOUT_VERSION),
                    [],
                )?;
                tx.commit()?;
                Ok(())
            }
            Self::LAYOUT_VERSION => Ok(()),
            version => Err(KvError::UnsupportedLayout {
                path: self.path.clone(),
                version,
            }),
        }
    }

    /// Starts a read transaction with a consistent snapshot
    pub fn begin_read(&self) -> Result<ReadTxn<'_>> {
        Ok(ReadTxn {
            tx: self.conn.unchecked_transaction()?,
        })
    }

    /// Starts the single write transaction; rolled back unless committed
    pub fn begin_write(&mut self) -> Result<WriteTxn<'_>> {
        Ok(WriteTxn {
            tx: self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?,
        })
    }

    /// Closes the database and releases the file lock
    pub fn close(self) -> Result<()> {
        let KvStore { conn, lock, .. } = self;
        conn.close().map_err(|(_, e)| KvError::Sqlite(e))?;
        FileExt::unlock(&lock)?;
        Ok(())
    }
}

fn bucket_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM buckets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Read-only view of the store
pub struct ReadTxn<'db> {
    tx: Transaction<'db>,
}

impl<'db> ReadTxn<'db> {
    /// Returns the named bucket, `None` if it was never created
    pub fn bucket(&self, name: &str) -> Result<Option<Bucket<'_>>> {
        if !bucket_exists(&self.tx, name)? {
            return Ok(None);
        }
        Ok(Some(Bucket {
            conn: &self.tx,
            name: name.to_string(),
        }))
    }
}

/// Read-write view of the store
pub struct WriteTxn<'db> {
    tx: Transaction<'db>,
}

impl<'db> WriteTxn<'db> {
    /// Returns the named bucket, `None` if it was never created
    pub fn bucket(&self, name: &str) -> Result<Option<BucketMut<'_>>> {
        if !bucket_exists(&self.tx, name)? {
            return Ok(None);
        }
        Ok(Some(BucketMut::new(&self.tx, name)))
    }

    /// Returns the named bucket, creating it if needed
    pub fn create_bucket_if_not_exists(&self, name: &str) -> Result<BucketMut<'_>> {
        self.tx.execute(
            "INSERT OR IGNORE INTO buckets (name, sequence) VALUES (?1, 0)",
            params![name],
        )?;
        Ok(BucketMut::new(&self.tx, name))
    }

    /// Makes every change in this transaction durable
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

/// Ordered key-value pairs within one bucket
pub struct Bucket<'t> {
    conn: &'t Connection,
    name: String,
}

impl<'t> Bucket<'t> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a single key
    #[cfg(test)]
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE bucket = ?1 AND key = ?2",
                params![self.name, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// All entries in ascending key order
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key")?;

        let rows = stmt.query_map(params![self.name], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Number of entries
    #[cfg(test)]
    fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE bucket = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[cfg(test)]
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current value of the bucket's sequence
    #[cfg(test)]
    fn sequence(&self) -> Result<u64> {
        let seq: i64 = self.conn.query_row(
            "SELECT sequence FROM buckets WHERE name = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }
}

/// A bucket opened inside a write transaction
pub struct BucketMut<'t> {
    inner: Bucket<'t>,
}

impl<'t> BucketMut<'t> {
    fn new(conn: &'t Connection, name: &str) -> Self {
        Self {
            inner: Bucket {
                conn,
                name: name.to_string(),
            },
        }
    }

    /// Increments and returns the bucket's sequence; the first value is 1
    pub fn next_sequence(&self) -> Result<u64> {
        let seq: i64 = self.inner.conn.query_row(
            "UPDATE buckets SET sequence = sequence + 1 WHERE name = ?1 RETURNING sequence",
            params![self.inner.name],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }

    /// Inserts or replaces a value
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.conn.execute(
            "INSERT OR REPLACE INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)",
            params![self.inner.name, key, value],
        )?;
        Ok(())
    }

    /// Deletes a key, returning whether it was present
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let changed = self.inner.conn.execute(
            "DELETE FROM entries WHERE bucket = ?1 AND key = ?2",
            params![self.inner.name, key],
        )?;
        Ok(changed > 0)
    }
}

impl<'t> Deref for BucketMut<'t> {
    type Target = Bucket<'t>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> KvStore {
        KvStore::open(dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn missing_bucket_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let tx = store.begin_read().unwrap();
        assert!(tx.bucket("nothing").unwrap().is_none());
    }

    #[test]
    fn sequence_starts_at_one_and_is_per_bucket() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let tx = store.begin_write().unwrap();
        let a = tx.create_bucket_if_not_exists("a").unwrap();
        let b = tx.create_bucket_if_not_exists("b").unwrap();

        assert_eq!(a.next_sequence().unwrap(), 1);
        assert_eq!(a.next_sequence().unwrap(), 2);
        assert_eq!(b.next_sequence().unwrap(), 1);
        drop((a, b));
        tx.commit().unwrap();
    }

    #[test]
    fn entries_iterate_in_numeric_key_order() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let tx = store.begin_write().unwrap();
        {
            let bucket = tx.create_bucket_if_not_exists("nums").unwrap();
            for n in [300u64, 2, 256, 1, 70_000] {
                bucket.put(&u64_key(n), n.to_string().as_bytes()).unwrap();
            }
        }
        tx.commit().unwrap();

        let tx = store.begin_read().unwrap();
        let bucket = tx.bucket("nums").unwrap().unwrap();
        let keys: Vec<u64> = bucket
            .entries()
            .unwrap()
            .iter()
            .map(|(k, _)| key_u64(k).unwrap())
            .collect();
        assert_eq!(keys, vec![1, 2, 256, 300, 70_000]);
    }

    #[test]
    fn uncommitted_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        {
            let tx = store.begin_write().unwrap();
            let bucket = tx.create_bucket_if_not_exists("b").unwrap();
            bucket.put(b"k", b"v").unwrap();
        }

        let tx = store.begin_read().unwrap();
        assert!(tx.bucket("b").unwrap().is_none());
    }

    #[test]
    fn delete_reports_presence() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let tx = store.begin_write().unwrap();
        {
            let bucket = tx.create_bucket_if_not_exists("b").unwrap();
            bucket.put(b"k", b"v").unwrap();
            assert_eq!(bucket.get(b"k").unwrap(), Some(b"v".to_vec()));
            assert!(bucket.delete(b"k").unwrap());
            assert!(!bucket.delete(b"k").unwrap());
            assert!(bucket.is_empty().unwrap());
        }
        tx.commit().unwrap();
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        let mut store = KvStore::open(&path).unwrap();
        let tx = store.begin_write().unwrap();
        {
            let bucket = tx.create_bucket_if_not_exists("b").unwrap();
            let seq = bucket.next_sequence().unwrap();
            bucket.put(&u64_key(seq), b"first").unwrap();
        }
        tx.commit().unwrap();
        store.close().unwrap();

        let store = KvStore::open(&path).unwrap();
        let tx = store.begin_read().unwrap();
        let bucket = tx.bucket("b").unwrap().unwrap();
        assert_eq!(bucket.sequence().unwrap(), 1);
        assert_eq!(bucket.get(&u64_key(1)).unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn second_open_is_rejected_while_locked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        let store = KvStore::open(&path).unwrap();
        let err = KvStore::open(&path).err().unwrap();
        assert!(matches!(err, KvError::Locked(_)));

        store.close().unwrap();
        assert!(KvStore::open(&path).is_ok());
    }

    #[test]
    fn garbage_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();

        assert!(KvStore::open(&path).is_err());
    }

    #[test]
    fn unknown_layout_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("PRAGMA user_version = 99", []).unwrap();
        }

        let err = KvStore::open(&path).err().unwrap();
        assert!(matches!(err, KvError::UnsupportedLayout { version: 99, .. }));
    }

    #[test]
    fn key_decoding_checks_length() {
        assert_eq!(key_u64(&u64_key(42)), Some(42));
        assert_eq!(key_u64(&[1, 2, 3]), None);
    }
}
