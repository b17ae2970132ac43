use super::{
    root_prefix, BrightnessCache, CacheError, CacheStats, Lookup, WallpaperRecord, SCHEMA_VERSION,
};
use crate::brightness::BrightnessBucket;
use crate::measure::KurtosisMeter;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connection waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl BrightnessCache {
    /// Default database location in the user's data directory.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "nextwall", "nextwall")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/tmp/nextwall"))
            .join("nextwall.db")
    }

    /// Open the store at `db_path`, creating an empty one if it is missing.
    pub fn open(db_path: &Path, meter: Arc<dyn KurtosisMeter>) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let cache = Self {
            db_path: db_path.to_path_buf(),
            meter,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn meter(&self) -> &dyn KurtosisMeter {
        self.meter.as_ref()
    }

    fn connect(&self) -> Result<Connection, CacheError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS wallpapers (
                id                  INTEGER PRIMARY KEY,
                path                TEXT NOT NULL,
                kurtosis            REAL,
                defined_brightness  INTEGER,
                rating              INTEGER
            );
            CREATE TABLE IF NOT EXISTS info (
                id      INTEGER PRIMARY KEY,
                name    TEXT UNIQUE,
                value   TEXT
            );",
        )?;

        // Older databases did not enforce unique paths; keep the first row.
        let removed = tx.execute(
            "DELETE FROM wallpapers
             WHERE id NOT IN (SELECT MIN(id) FROM wallpapers GROUP BY path)",
            [],
        )?;
        if removed > 0 {
            info!("removed {} duplicate wallpaper rows", removed);
        }

        tx.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS wallpapers_path_idx ON wallpapers (path);",
        )?;

        let version: Option<String> = tx
            .query_row(
                "SELECT value FROM info WHERE name = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match version {
            None => {
                tx.execute(
                    "INSERT INTO info (name, value) VALUES ('version', ?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
            Some(v) if v != SCHEMA_VERSION => {
                tx.execute(
                    "UPDATE info SET value = ?1 WHERE name = 'version'",
                    params![SCHEMA_VERSION],
                )?;
                info!("wallpaper database upgraded from v{} to v{}", v, SCHEMA_VERSION);
            }
            Some(_) => {}
        }

        tx.commit()?;
        debug!("wallpaper database ready at {}", self.db_path.display());
        Ok(())
    }

    /// Schema version recorded in the store.
    pub fn schema_version(&self) -> Result<Option<String>, CacheError> {
        let conn = self.connect()?;
        let version = conn
            .query_row(
                "SELECT value FROM info WHERE name = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Cached kurtosis for `path`, `None` when not measured yet.
    pub fn get_kurtosis(&self, path: &Path) -> Result<Option<f64>, CacheError> {
        let key = path_key(path)?;
        let conn = self.connect()?;
        let kurtosis = conn
            .query_row(
                "SELECT kurtosis FROM wallpapers WHERE path = ?1",
                params![key],
                |row| Ok(kurtosis_value(row.get_ref(0)?)),
            )
            .optional()?;
        Ok(kurtosis.flatten())
    }

    /// Run the meter once and persist the result.
    ///
    /// Nothing is written when the measurement fails.
    pub fn compute_and_store(&self, path: &Path) -> Result<f64, CacheError> {
        let key = path_key(path)?;
        debug!("measuring {} with {}", path.display(), self.meter.name());
        let kurtosis = self.meter.measure(path)?;

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO wallpapers (path, kurtosis) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET kurtosis = excluded.kurtosis",
            params![key, kurtosis],
        )?;
        info!("kurtosis of {}: {:.4}", path.display(), kurtosis);
        Ok(kurtosis)
    }

    /// Cached value, or measure and store it.
    pub fn get_or_compute(&self, path: &Path) -> Result<f64, CacheError> {
        self.lookup_or_compute(path).map(Lookup::kurtosis)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) but tells whether the
    /// meter ran.
    pub fn lookup_or_compute(&self, path: &Path) -> Result<Lookup, CacheError> {
        match self.get_kurtosis(path)? {
            Some(kurtosis) => Ok(Lookup::Cached(kurtosis)),
            None => self.compute_and_store(path).map(Lookup::Measured),
        }
    }

    /// Pin `path` to a bucket regardless of its kurtosis.
    pub fn set_override(&self, path: &Path, bucket: BrightnessBucket) -> Result<(), CacheError> {
        let key = path_key(path)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO wallpapers (path, defined_brightness) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET defined_brightness = excluded.defined_brightness",
            params![key, bucket.as_i64()],
        )?;
        info!("brightness of {} set to {}", path.display(), bucket);
        Ok(())
    }

    /// Drop the user override. Returns false if there was no record.
    pub fn clear_override(&self, path: &Path) -> Result<bool, CacheError> {
        let key = path_key(path)?;
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE wallpapers SET defined_brightness = NULL WHERE path = ?1",
            params![key],
        )?;
        Ok(changed > 0)
    }

    pub fn get_override(&self, path: &Path) -> Result<Option<BrightnessBucket>, CacheError> {
        Ok(self.get_record(path)?.and_then(|r| r.defined_brightness))
    }

    pub fn get_record(&self, path: &Path) -> Result<Option<WallpaperRecord>, CacheError> {
        let key = path_key(path)?;
        let conn = self.connect()?;
        let record = conn
            .query_row(
                "SELECT path, kurtosis, defined_brightness, rating
                 FROM wallpapers WHERE path = ?1",
                params![key],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Remove the record for `path`. Returns false if there was none.
    pub fn delete(&self, path: &Path) -> Result<bool, CacheError> {
        let key = path_key(path)?;
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM wallpapers WHERE path = ?1", params![key])?;
        if removed > 0 {
            info!("removed {} from the wallpaper database", path.display());
        }
        Ok(removed > 0)
    }

    /// All records whose path lies under `root`, sorted by path.
    pub fn records_under(&self, root: &Path) -> Result<Vec<WallpaperRecord>, CacheError> {
        let prefix = root_prefix(root)?;
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT path, kurtosis, defined_brightness, rating
             FROM wallpapers
             WHERE substr(path, 1, length(?1)) = ?1
             ORDER BY path",
        )?;
        let records = stmt
            .query_map(params![prefix], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn stats(&self, root: &Path) -> Result<CacheStats, CacheError> {
        Ok(CacheStats::from_records(&self.records_under(root)?))
    }
}

fn path_key(path: &Path) -> Result<&str, CacheError> {
    path.to_str()
        .ok_or_else(|| CacheError::NonUtf8Path(path.to_path_buf()))
}

/// Kurtosis column value. Early versions stored the raw text printed by
/// `identify`, so text is parsed too.
fn kurtosis_value(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Real(k) => Some(k),
        ValueRef::Integer(k) => Some(k as f64),
        ValueRef::Text(text) => std::str::from_utf8(text)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
    .filter(|k| k.is_finite())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<WallpaperRecord> {
    let path: String = row.get(0)?;
    let kurtosis = kurtosis_value(row.get_ref(1)?);
    let defined: Option<i64> = row.get(2)?;
    let defined_brightness = defined.and_then(|value| {
        let bucket = BrightnessBucket::from_i64(value);
        if bucket.is_none() {
            warn!("ignoring invalid brightness {} stored for {}", value, path);
        }
        bucket
    });
    let rating: Option<i64> = row.get(3)?;

    Ok(WallpaperRecord {
        path: PathBuf::from(path),
        kurtosis,
        defined_brightness,
        rating,
    })
}
