mod photos;

use crate::domain::{DomainError, NewPhoto, PhotoRecord, PhotoRepository};
use rusqlite::Connection;
use std::sync::{Condvar, Mutex, PoisonError};
use tracing::{debug, info};

const POOL_SIZE: usize = 4;

pub struct SqliteRepository {
    pool: Mutex<Vec<Connection>>,
    available: Condvar,
}

impl SqliteRepository {
    pub fn new(path: &str) -> Result<Self, DomainError> {
        info!("Opening photo store at {}", path);
        let conn = Self::open_conn(path)?;

        debug!("Ensuring photos table exists");
        // AUTOINCREMENT keeps ids from ever being reused.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                emotion TEXT,
                confidence REAL,
                upload_time TEXT NOT NULL,
                CHECK ((emotion IS NULL) = (confidence IS NULL))
            )",
            [],
        )
        .map_err(|e| DomainError::StoreUnavailable(format!("Failed to create photos table: {}", e)))?;

        let mut connections = vec![conn];
        for _ in 1..POOL_SIZE {
            connections.push(Self::open_conn(path)?);
        }

        Ok(Self {
            pool: Mutex::new(connections),
            available: Condvar::new(),
        })
    }

    fn open_conn(path: &str) -> Result<Connection, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::StoreUnavailable(format!("Failed to open connection: {}", e)))?;

        // PRAGMAs that return values go through query_row.
        let _: String = conn
            .query_row("PRAGMA journal_mode=DELETE", [], |r| r.get(0))
            .unwrap_or_else(|_| "DELETE".to_string());

        let _: i64 = conn
            .query_row("PRAGMA busy_timeout=10000", [], |r| r.get(0))
            .unwrap_or(10000);

        Ok(conn)
    }

    pub(crate) fn with_conn<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DomainError>,
    {
        // The pool only holds idle connections, so a poisoned guard is still usable.
        let mut conn = {
            let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(conn) = pool.pop() {
                    break conn;
                }
                pool = self.available.wait(pool).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let result = f(&mut conn);

        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(conn);
        self.available.notify_one();

        result
    }
}

impl PhotoRepository for SqliteRepository {
    fn highest_id(&self) -> Result<i64, DomainError> {
        self.highest_id_impl()
    }

    fn insert(&self, photo: &NewPhoto) -> Result<i64, DomainError> {
        self.insert_impl(photo)
    }

    fn get_by_id(&self, id: i64) -> Result<PhotoRecord, DomainError> {
        self.get_by_id_impl(id)
    }

    fn list_all(&self) -> Result<Vec<PhotoRecord>, DomainError> {
        self.list_all_impl()
    }

    fn update(&self, record: &PhotoRecord) -> Result<(), DomainError> {
        self.update_impl(record)
    }
}

/// Temporary on-disk database for tests; the directory is removed on drop.
#[cfg(test)]
pub struct TestDb {
    pub path: String,
    pub repo: SqliteRepository,
    _dir: tempfile::TempDir,
}

#[cfg(test)]
impl TestDb {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join(format!("{}.db", name))
            .to_string_lossy()
            .into_owned();
        let repo = SqliteRepository::new(&path).unwrap();
        Self { path, repo, _dir: dir }
    }

    /// A second repository over the same file, as a restarted process would
    /// open it.
    pub fn reopen(&self) -> SqliteRepository {
        SqliteRepository::new(&self.path).unwrap()
    }
}
