//! File-backed key-value store on `redb`.
//!
//! Layout:
//! - `values`: key -> bytes
//! - `expiries`: key -> deadline in epoch milliseconds
//! - `log_lengths`: log key -> entry count
//! - `logs`: (log key, index) -> entry
//!
//! Every mutating call runs in one write transaction, which `redb`
//! serializes, so each single-key operation is atomic for every thread
//! sharing one [`RedbStore`] through a `SharedStore` handle.
//!
//! `redb` locks the file exclusively: a second open of the same path, from
//! this process or another, fails with `CoreError::Backend` while the first
//! handle is alive.

use crate::memory::zero_ttl;
use crate::store::{KeyValueStore, resolve_range};
use redb::{Database, DatabaseError, ReadableTable, Table, TableDefinition, WriteTransaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tally_core::value::decode_int;
use tally_core::{CoreError, CoreResult, SharedClock, SystemClock, Timestamp};

const VALUES: TableDefinition<&str, &[u8]> = TableDefinition::new("values");
const EXPIRIES: TableDefinition<&str, u64> = TableDefinition::new("expiries");
const LOG_LENGTHS: TableDefinition<&str, u64> = TableDefinition::new("log_lengths");
const LOGS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("logs");

/// Map any `redb` failure onto `CoreError::Backend`
trait OrBackend<T> {
    fn or_backend(self) -> CoreResult<T>;
}

impl<T, E: std::fmt::Display> OrBackend<T> for Result<T, E> {
    fn or_backend(self) -> CoreResult<T> {
        self.map_err(CoreError::backend)
    }
}

/// Persistent store in a single `redb` file
pub struct RedbStore {
    db: Database,
    clock: SharedClock,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create the database at `path`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open with a caller-supplied clock for expiry
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the file cannot be opened
    pub fn open_with_clock(path: impl AsRef<Path>, clock: SharedClock) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_backend()?;
        }
        let db = Database::create(&path).map_err(|err| match err {
            DatabaseError::DatabaseAlreadyOpen => CoreError::backend(format!(
                "store {} is already in use by another handle",
                path.display()
            )),
            other => CoreError::backend(other),
        })?;
        let store = Self { db, clock, path };

        // Create every table up front so read transactions never miss one
        store.write(|txn| {
            txn.open_table(VALUES).or_backend()?;
            txn.open_table(EXPIRIES).or_backend()?;
            txn.open_table(LOG_LENGTHS).or_backend()?;
            txn.open_table(LOGS).or_backend()?;
            Ok(())
        })?;

        tracing::debug!(path = %store.path.display(), "opened redb store");
        Ok(store)
    }

    /// Path of the database file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every expired value, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the write fails
    pub fn purge_expired(&self) -> CoreResult<usize> {
        let now = self.clock.now();
        self.write(|txn| {
            let mut values = txn.open_table(VALUES).or_backend()?;
            let mut expiries = txn.open_table(EXPIRIES).or_backend()?;

            let mut expired = Vec::new();
            for item in expiries.iter().or_backend()? {
                let (key, deadline) = item.or_backend()?;
                if Timestamp::from_millis(deadline.value()).is_reached_at(now) {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                values.remove(key.as_str()).or_backend()?;
                expiries.remove(key.as_str()).or_backend()?;
            }
            if !expired.is_empty() {
                tracing::debug!(removed = expired.len(), "purged expired entries");
            }
            Ok(expired.len())
        })
    }

    fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> CoreResult<T>) -> CoreResult<T> {
        let txn = self.db.begin_write().or_backend()?;
        let out = f(&txn)?;
        txn.commit().or_backend()?;
        Ok(out)
    }

    /// Live deadline check inside a read-only view
    fn is_live(&self, expiries: &impl ReadableTable<&'static str, u64>, key: &str) -> CoreResult<bool> {
        let deadline = expiries.get(key).or_backend()?.map(|g| g.value());
        Ok(match deadline {
            Some(at) => !Timestamp::from_millis(at).is_reached_at(self.clock.now()),
            None => true,
        })
    }

    /// Remove `key` from the value tables if its expiry has passed
    fn evict_if_expired(
        &self,
        values: &mut Table<'_, &'static str, &'static [u8]>,
        expiries: &mut Table<'_, &'static str, u64>,
        key: &str,
    ) -> CoreResult<()> {
        if !self.is_live(&*expiries, key)? {
            values.remove(key).or_backend()?;
            expiries.remove(key).or_backend()?;
        }
        Ok(())
    }
}

impl KeyValueStore for RedbStore {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().or_backend()?;
        let lengths = txn.open_table(LOG_LENGTHS).or_backend()?;
        if lengths.get(key).or_backend()?.is_some() {
            return Err(wrong_type(key));
        }

        let expiries = txn.open_table(EXPIRIES).or_backend()?;
        if !self.is_live(&expiries, key)? {
            return Ok(None);
        }
        let values = txn.open_table(VALUES).or_backend()?;
        let value = values.get(key).or_backend()?.map(|g| g.value().to_vec());
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        self.write(|txn| {
            if txn.open_table(LOG_LENGTHS).or_backend()?.get(key).or_backend()?.is_some() {
                return Err(wrong_type(key));
            }
            txn.open_table(VALUES).or_backend()?.insert(key, value).or_backend()?;
            txn.open_table(EXPIRIES).or_backend()?.remove(key).or_backend()?;
            Ok(())
        })
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> CoreResult<()> {
        if ttl.is_zero() {
            return Err(zero_ttl());
        }
        let deadline = self.clock.now().add(ttl);
        self.write(|txn| {
            if txn.open_table(LOG_LENGTHS).or_backend()?.get(key).or_backend()?.is_some() {
                return Err(wrong_type(key));
            }
            txn.open_table(VALUES).or_backend()?.insert(key, value).or_backend()?;
            txn.open_table(EXPIRIES)
                .or_backend()?
                .insert(key, deadline.as_millis())
                .or_backend()?;
            Ok(())
        })
    }

    fn increment(&self, key: &str) -> CoreResult<i64> {
        self.write(|txn| {
            if txn.open_table(LOG_LENGTHS).or_backend()?.get(key).or_backend()?.is_some() {
                return Err(wrong_type(key));
            }
            let mut values = txn.open_table(VALUES).or_backend()?;
            let mut expiries = txn.open_table(EXPIRIES).or_backend()?;
            self.evict_if_expired(&mut values, &mut expiries, key)?;

            let current = match values.get(key).or_backend()? {
                Some(guard) => decode_int(guard.value())?,
                None => 0,
            };
            let next = current
                .checked_add(1)
                .ok_or_else(|| CoreError::decoding("integer", "increment would overflow"))?;
            values
                .insert(key, next.to_string().as_bytes())
                .or_backend()?;
            Ok(next)
        })
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        let txn = self.db.begin_read().or_backend()?;
        let lengths = txn.open_table(LOG_LENGTHS).or_backend()?;
        if lengths.get(key).or_backend()?.is_some() {
            return Ok(true);
        }
        let values = txn.open_table(VALUES).or_backend()?;
        if values.get(key).or_backend()?.is_none() {
            return Ok(false);
        }
        let expiries = txn.open_table(EXPIRIES).or_backend()?;
        self.is_live(&expiries, key)
    }

    fn append_to_log(&self, key: &str, entry: &[u8]) -> CoreResult<u64> {
        self.write(|txn| {
            {
                let mut values = txn.open_table(VALUES).or_backend()?;
                let mut expiries = txn.open_table(EXPIRIES).or_backend()?;
                self.evict_if_expired(&mut values, &mut expiries, key)?;
                if values.get(key).or_backend()?.is_some() {
                    return Err(wrong_type(key));
                }
            }

            let mut lengths = txn.open_table(LOG_LENGTHS).or_backend()?;
            let len = lengths.get(key).or_backend()?.map_or(0, |g| g.value());
            txn.open_table(LOGS)
                .or_backend()?
                .insert((key, len), entry)
                .or_backend()?;
            lengths.insert(key, len + 1).or_backend()?;
            Ok(len + 1)
        })
    }

    fn read_log(&self, key: &str, start: i64, end: i64) -> CoreResult<Vec<Vec<u8>>> {
        let txn = self.db.begin_read().or_backend()?;
        let values = txn.open_table(VALUES).or_backend()?;
        if values.get(key).or_backend()?.is_some() {
            let expiries = txn.open_table(EXPIRIES).or_backend()?;
            if self.is_live(&expiries, key)? {
                return Err(wrong_type(key));
            }
        }

        let lengths = txn.open_table(LOG_LENGTHS).or_backend()?;
        let len = lengths.get(key).or_backend()?.map_or(0, |g| g.value());
        let Some(range) = resolve_range(len, start, end) else {
            return Ok(Vec::new());
        };

        let logs = txn.open_table(LOGS).or_backend()?;
        let mut entries = Vec::with_capacity((range.end - range.start) as usize);
        for index in range {
            let guard = logs.get((key, index)).or_backend()?.ok_or_else(|| {
                CoreError::backend(format!("log {} is missing entry {}", key, index))
            })?;
            entries.push(guard.value().to_vec());
        }
        Ok(entries)
    }

    fn log_len(&self, key: &str) -> CoreResult<u64> {
        let txn = self.db.begin_read().or_backend()?;
        let values = txn.open_table(VALUES).or_backend()?;
        if values.get(key).or_backend()?.is_some() {
            let expiries = txn.open_table(EXPIRIES).or_backend()?;
            if self.is_live(&expiries, key)? {
                return Err(wrong_type(key));
            }
        }
        let lengths = txn.open_table(LOG_LENGTHS).or_backend()?;
        let len = lengths.get(key).or_backend()?.map_or(0, |g| g.value());
        Ok(len)
    }

    fn flush(&self) -> CoreResult<()> {
        self.write(|txn| {
            txn.delete_table(VALUES).or_backend()?;
            txn.delete_table(EXPIRIES).or_backend()?;
            txn.delete_table(LOG_LENGTHS).or_backend()?;
            txn.delete_table(LOGS).or_backend()?;
            txn.open_table(VALUES).or_backend()?;
            txn.open_table(EXPIRIES).or_backend()?;
            txn.open_table(LOG_LENGTHS).or_backend()?;
            txn.open_table(LOGS).or_backend()?;
            Ok(())
        })?;
        tracing::debug!(path = %self.path.display(), "flushed redb store");
        Ok(())
    }
}

fn wrong_type(key: &str) -> CoreError {
    CoreError::WrongType {
        key: key.to_string(),
    }
}
