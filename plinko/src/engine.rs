//! Query engine (spec component E): plaintext, set-parity, full-set, and
//! health operations over a loaded [`Database`].
//!
//! Every operation times itself with [`Instant`]/[`Duration`] and returns
//! the elapsed time alongside the result. None of them log the queried
//! index or PRF key, by construction: the error and tracing paths below
//! only ever carry sizes and counts, never caller-supplied values.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::db::{Database, DatabaseError, PirParams};
use crate::prf::PrfKey128;
use crate::prset::PRSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("indices list cannot be empty")]
    EmptyIndices,
    #[error("index cannot be negative")]
    NegativeIndex,
    /// Display deliberately omits `index`: spec §6.2 forbids echoing the
    /// caller-supplied index back in an error body, and this message is
    /// surfaced to the client verbatim as the 400 response body.
    #[error("index out of bounds [0, {size})")]
    IndexOutOfBounds { index: u64, size: u64 },
    /// A PRSet-expanded index fell outside `[0, n)`. This is a server-side
    /// parameter inconsistency, never a client error, so it must surface as
    /// HTTP 500 rather than 400 (spec §4.E, §7).
    #[error("full-set expansion produced index {index} out of bounds [0, {size})")]
    Internal { index: u64, size: u64 },
}

/// Converts a `Database` lookup failure occurring on a client-validated
/// index (plaintext, set-parity) into the matching client-facing error.
/// `full_set` must not use this conversion: its indices come from PRSet
/// expansion, not the caller, so an out-of-bounds hit there is `Internal`.
impl From<DatabaseError> for QueryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::IndexOutOfBounds { index, size } => {
                QueryError::IndexOutOfBounds { index, size }
            }
            // get_entry is only ever called with already-validated indices,
            // so the remaining DatabaseError variants cannot occur here.
            other => unreachable!("unexpected database error in query path: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database_loaded: bool,
    pub database_size: u64,
    pub chunk_size: u64,
    pub set_size: u64,
}

/// Validate a caller-supplied signed index against the database size,
/// distinguishing "negative" from "out of bounds" the way the reference
/// validator does.
fn validate_index(index: i64, size: u64) -> Result<u64, QueryError> {
    if index < 0 {
        return Err(QueryError::NegativeIndex);
    }
    let index = index as u64;
    if index >= size {
        return Err(QueryError::IndexOutOfBounds { index, size });
    }
    Ok(index)
}

fn compute_xor(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0u64, |acc, v| acc ^ v)
}

/// Holds a handle to the loaded database and exposes the PIR query
/// surface. Cheap to clone (an `Arc` around the database).
#[derive(Clone)]
pub struct QueryEngine {
    db: Arc<Database>,
}

impl QueryEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn params(&self) -> PirParams {
        self.db.params()
    }

    pub fn health(&self) -> HealthStatus {
        let params = self.db.params();
        HealthStatus {
            status: "healthy",
            database_loaded: self.db.size() > 0,
            database_size: self.db.size(),
            chunk_size: params.chunk_size,
            set_size: params.set_size,
        }
    }

    /// Return the value at `index` verbatim. Does not log `index`.
    pub fn plaintext(&self, index: i64) -> Result<(u64, Duration), QueryError> {
        let start = Instant::now();
        let index = validate_index(index, self.db.size())?;
        let value = self.db.get_entry(index)?;
        Ok((value, start.elapsed()))
    }

    /// XOR of the values at a caller-chosen set of indices. Does not log
    /// the indices.
    pub fn set_parity(&self, indices: &[i64]) -> Result<(u64, Duration), QueryError> {
        let start = Instant::now();
        if indices.is_empty() {
            return Err(QueryError::EmptyIndices);
        }

        let size = self.db.size();
        let mut values = Vec::with_capacity(indices.len());
        for &index in indices {
            let index = validate_index(index, size)?;
            values.push(self.db.get_entry(index)?);
        }

        Ok((compute_xor(values), start.elapsed()))
    }

    /// XOR of the values at a pseudorandom set expanded from `prf_key`.
    /// Does not log `prf_key` or the expanded set. An expanded index outside
    /// `[0, n)` is a parameter-derivation bug, not a caller mistake, so it
    /// is reported as `QueryError::Internal` rather than the client-facing
    /// out-of-bounds variant used by `plaintext`/`set_parity`.
    pub fn full_set(&self, prf_key: &PrfKey128) -> Result<(u64, Duration), QueryError> {
        let start = Instant::now();
        let size = self.db.size();
        let params = self.db.params();
        let indices = PRSet::new(prf_key).expand(params.set_size, params.chunk_size);

        let mut values = Vec::with_capacity(indices.len());
        for index in indices {
            let value = self.db.get_entry(index).map_err(|_| QueryError::Internal { index, size })?;
            values.push(value);
        }

        Ok((compute_xor(values), start.elapsed()))
    }
}
