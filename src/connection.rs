//! Scoped access to the local store file.
//!
//! Every repository operation acquires its own handle and releases it before
//! returning. There is no pooling: one handle per scope, sequential use.

use crate::config::Settings;
use crate::error::{IngestError, Result};
use rusqlite::{Connection, ErrorCode};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens scoped handles to the store.
///
/// Cheap to clone; clones share the same live-handle counter.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    default_path: PathBuf,
    open_handles: Arc<AtomicUsize>,
}

impl ConnectionManager {
    /// Creates a manager that defaults to the configured store location.
    pub fn new(settings: &Settings) -> Self {
        Self::with_path(&settings.store_path)
    }

    /// Creates a manager that defaults to `path`.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        ConnectionManager {
            default_path: path.as_ref().to_path_buf(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the store location used when no override is given.
    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Opens a handle to `path`, or to the default location when `None`.
    ///
    /// The handle is released when the returned guard is dropped or closed.
    ///
    /// # Errors
    /// Returns [`IngestError::Open`] if the file cannot be opened. The store's
    /// parent directory is not created.
    pub fn acquire(&self, path: Option<&Path>) -> Result<ScopedConnection> {
        let path = path.unwrap_or(&self.default_path).to_path_buf();
        let conn = Connection::open(&path).map_err(|source| IngestError::Open {
            path: path.clone(),
            source,
        })?;

        self.open_handles.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path.display(), "store handle acquired");

        Ok(ScopedConnection {
            conn: Some(conn),
            path,
            open_handles: Arc::clone(&self.open_handles),
        })
    }

    /// Runs `body` with a freshly acquired handle, releasing it on every exit
    /// path: success, error return, or unwind.
    ///
    /// SQLite opens lazily, so a store locked by another writer only fails at
    /// the first statement. Busy and locked failures are reported as
    /// [`IngestError::Open`] for the store path.
    pub fn with_connection<T, F>(&self, path: Option<&Path>, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut scope = self.acquire(path)?;
        body(&mut *scope).map_err(|err| match err {
            IngestError::Storage(source) if is_lock_error(&source) => IngestError::Open {
                path: scope.path().to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Number of scoped handles currently live across all clones.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

fn is_lock_error(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// A store handle bound to one scope.
#[derive(Debug)]
pub struct ScopedConnection {
    conn: Option<Connection>,
    path: PathBuf,
    open_handles: Arc<AtomicUsize>,
}

impl ScopedConnection {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the handle now and reports any close failure.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                self.open_handles.fetch_sub(1, Ordering::SeqCst);
                debug!(path = %self.path.display(), "store handle released");
                conn.close().map_err(|(_, err)| IngestError::Storage(err))
            }
            None => Ok(()),
        }
    }
}

impl Deref for ScopedConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `close` and `drop` take the connection, and both consume the guard.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("handle used after release"))
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("handle used after release"))
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.open_handles.fetch_sub(1, Ordering::SeqCst);
            if let Err((_, err)) = conn.close() {
                warn!(path = %self.path.display(), error = %err, "failed to close store handle");
            } else {
                debug!(path = %self.path.display(), "store handle released");
            }
        }
    }
}
