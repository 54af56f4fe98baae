//! Canonical database snapshot (spec component B).
//!
//! The database is a flat file of big-endian `u64` records, memory-mapped
//! read-only. `chunk_size`/`set_size` are the PIR parameters derived from
//! its size; they never change for the lifetime of a loaded `Database`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use memmap2::Mmap;
use thiserror::Error;

const ENTRY_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database file not found: {0}")]
    NotFound(PathBuf),
    #[error("timed out after {0:?} waiting for database file at {1}")]
    WaitTimeout(Duration, PathBuf),
    #[error("failed to open database file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to map database file {path}: {source}")]
    Mmap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database file size {size} is not a multiple of entry size {entry_size}")]
    MisalignedSize { size: usize, entry_size: usize },
    #[error("database index {index} out of bounds [0, {size})")]
    IndexOutOfBounds { index: u64, size: u64 },
}

/// PIR parameters derived from the database size: `chunk_size = max(1,
/// db_size / 1024)`, `set_size = max(1, db_size / chunk_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PirParams {
    pub chunk_size: u64,
    pub set_size: u64,
}

impl PirParams {
    pub fn derive(db_size: u64) -> Self {
        let chunk_size = (db_size / 1024).max(1);
        let set_size = (db_size / chunk_size).max(1);
        Self { chunk_size, set_size }
    }
}

/// A loaded, memory-mapped database of `u64` records.
pub struct Database {
    mmap: Mmap,
    size: u64,
    params: PirParams,
}

impl Database {
    /// Load the database at `path`, waiting up to `wait_timeout` for the
    /// file to appear (`None` means check once and fail immediately if
    /// absent, matching a zero-second timeout).
    pub fn load(path: &Path, wait_timeout: Option<Duration>) -> Result<Self, DatabaseError> {
        wait_for_database(path, wait_timeout)?;

        let file = std::fs::File::open(path).map_err(|source| DatabaseError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| DatabaseError::Mmap {
            path: path.to_path_buf(),
            source,
        })?;

        if mmap.len() % ENTRY_SIZE != 0 {
            return Err(DatabaseError::MisalignedSize {
                size: mmap.len(),
                entry_size: ENTRY_SIZE,
            });
        }

        let size = (mmap.len() / ENTRY_SIZE) as u64;
        let params = PirParams::derive(size);

        Ok(Self { mmap, size, params })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn params(&self) -> PirParams {
        self.params
    }

    pub fn size_mb(&self) -> f64 {
        (self.size as f64 * ENTRY_SIZE as f64) / (1024.0 * 1024.0)
    }

    /// Read a single big-endian `u64` record.
    pub fn get_entry(&self, index: u64) -> Result<u64, DatabaseError> {
        if index >= self.size {
            return Err(DatabaseError::IndexOutOfBounds { index, size: self.size });
        }
        let offset = (index as usize) * ENTRY_SIZE;
        let bytes: [u8; 8] = self.mmap[offset..offset + ENTRY_SIZE]
            .try_into()
            .expect("slice of ENTRY_SIZE bytes");
        Ok(u64::from_be_bytes(bytes))
    }
}

fn wait_for_database(path: &Path, timeout: Option<Duration>) -> Result<(), DatabaseError> {
    let Some(timeout) = timeout else {
        return if path.exists() {
            Ok(())
        } else {
            Err(DatabaseError::NotFound(path.to_path_buf()))
        };
    };

    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        if path.exists() {
            return Ok(());
        }
        attempts += 1;
        if attempts % 10 == 0 {
            tracing::info!(elapsed = ?start.elapsed(), timeout = ?timeout, "still waiting for database file");
        }
        if start.elapsed() >= timeout {
            return Err(DatabaseError::WaitTimeout(timeout, path.to_path_buf()));
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}
