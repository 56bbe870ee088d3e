use crate::error::StoreError;
use crate::records::SeenMarker;
use crate::store::{CacheEntry, OverrideStore, ResolutionCache, SeenStore, check_capacity};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use turso::Value;
use tokio::sync::Mutex;
use turso::params::Params;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS seen (record_id TEXT PRIMARY KEY, date TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS photo_override (record_id TEXT PRIMARY KEY, image BLOB NOT NULL)",
    // A NULL url is the not-found sentinel.
    "CREATE TABLE IF NOT EXISTS resolution_cache (record_id TEXT PRIMARY KEY, url TEXT)",
];

// ── Value extraction helpers ──

fn val_string(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn val_blob(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::Blob(b) => Some(b.clone()),
        _ => None,
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Local persistent store backed by a turso database file.
pub struct Database {
    conn: turso::Connection,
    max_photo_bytes: usize,
    // Held for every write so concurrent tasks never share an open transaction.
    write_lock: Mutex<()>,
}

impl Database {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path, max_photo_bytes: usize) -> Result<Self, StoreError> {
        let path_str = path.to_string_lossy().to_string();
        let db = turso::Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;
        for statement in SCHEMA {
            conn.execute(statement, ()).await?;
        }
        Ok(Database {
            conn,
            max_photo_bytes,
            write_lock: Mutex::new(()),
        })
    }

    /// Replace the row for `id` in `table`.
    ///
    /// Delete-then-insert keeps to the SQL subset every turso release accepts.
    /// Both run in one transaction, so a failed insert keeps the old row.
    async fn replace(&self, table: &str, id: &str, insert: &str, value: Value) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().await;
        self.conn.execute("BEGIN", ()).await?;
        let result = match self.replace_rows(table, id, insert, value).await {
            Ok(()) => self.conn.execute("COMMIT", ()).await.map(|_| ()).map_err(StoreError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = self.conn.execute("ROLLBACK", ()).await {
                tracing::warn!(table, record = %id, error = %e, "rollback failed");
            }
        }
        result
    }

    async fn replace_rows(&self, table: &str, id: &str, insert: &str, value: Value) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!("DELETE FROM {table} WHERE record_id = ?1"),
                Params::Positional(vec![text(id)]),
            )
            .await?;
        self.conn
            .execute(insert, Params::Positional(vec![text(id), value]))
            .await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().await;
        self.conn
            .execute(
                &format!("DELETE FROM {table} WHERE record_id = ?1"),
                Params::Positional(vec![text(id)]),
            )
            .await?;
        Ok(())
    }
}

impl SeenStore for Database {
    async fn all_seen(&self) -> Result<HashMap<String, SeenMarker>, StoreError> {
        let mut out = HashMap::new();
        let mut rows = self.conn.query("SELECT record_id, date FROM seen", ()).await?;
        while let Some(row) = rows.next().await? {
            let (Some(id), Some(date)) = (val_string(&row.get_value(0)?), val_string(&row.get_value(1)?))
            else {
                continue;
            };
            match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                Ok(date) => {
                    out.insert(id, SeenMarker { date });
                }
                Err(e) => {
                    tracing::warn!(record = %id, %date, error = %e, "skipping unreadable seen marker");
                }
            }
        }
        Ok(out)
    }

    async fn set_seen(&self, id: &str, marker: SeenMarker) -> Result<(), StoreError> {
        self.replace(
            "seen",
            id,
            "INSERT INTO seen (record_id, date) VALUES (?1, ?2)",
            Value::Text(marker.label()),
        )
        .await
    }

    async fn clear_seen(&self, id: &str) -> Result<(), StoreError> {
        self.delete("seen", id).await
    }
}

impl OverrideStore for Database {
    async fn get_override(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT image FROM photo_override WHERE record_id = ?1",
                Params::Positional(vec![text(id)]),
            )
            .await?;
        match rows.next().await? {
            Some(row) => match val_blob(&row.get_value(0)?) {
                Some(bytes) => Ok(Some(bytes)),
                None => Err(StoreError::Corrupt {
                    key: id.to_string(),
                    reason: "photo is not a blob".to_string(),
                }),
            },
            None => Ok(None),
        }
    }

    async fn set_override(&self, id: &str, jpeg: &[u8]) -> Result<(), StoreError> {
        check_capacity(jpeg.len(), self.max_photo_bytes)?;
        self.replace(
            "photo_override",
            id,
            "INSERT INTO photo_override (record_id, image) VALUES (?1, ?2)",
            Value::Blob(jpeg.to_vec()),
        )
        .await
    }
}

impl ResolutionCache for Database {
    async fn get_cached(&self, id: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT url FROM resolution_cache WHERE record_id = ?1",
                Params::Positional(vec![text(id)]),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(match val_string(&row.get_value(0)?) {
                Some(url) => CacheEntry::Found(url),
                None => CacheEntry::NotFound,
            })),
            None => Ok(None),
        }
    }

    async fn set_cached(&self, id: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let value = match entry {
            CacheEntry::Found(url) => text(url),
            CacheEntry::NotFound => Value::Null,
        };
        self.replace(
            "resolution_cache",
            id,
            "INSERT INTO resolution_cache (record_id, url) VALUES (?1, ?2)",
            value,
        )
        .await
    }

    async fn clear_cached(&self, id: &str) -> Result<(), StoreError> {
        self.delete("resolution_cache", id).await
    }
}
