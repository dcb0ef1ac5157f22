//! The [Store] trait describes what the hashing and resolution logic in
//! [crate::derivation] needs from a store implementation: dereferencing a
//! derivation by its store path, and looking up already-realized output
//! paths.
//!
//! A simple in-memory implementation, [MemoryStore], is provided. It's
//! useful for tests, and as a reference for what the contract means.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::derivation::Derivation;
use crate::store_path::StorePath;

/// Errors a [Store] implementation can produce.
///
/// These are I/O-flavoured and considered fatal by all callers in this
/// crate; "not found" conditions are expressed via `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

/// The capabilities the derivation layer consumes from a store.
///
/// All methods are synchronous and may block on I/O. Implementations must
/// be usable from multiple threads.
pub trait Store: Sync {
    /// Dereference a `.drv` store path to the [Derivation] stored there.
    ///
    /// Returns `Ok(None)` if the path is not present in the store. Callers
    /// computing hashes treat that as a dangling reference and fail.
    fn query_derivation(&self, drv_path: &StorePath) -> Result<Option<Derivation>, StoreError>;

    /// Look up the realized output path of a derivation's output, if it has
    /// been built.
    ///
    /// `Ok(None)` means "not built yet", which is an expected, retryable
    /// condition for resolution.
    fn query_output_path(
        &self,
        drv_path: &StorePath,
        output_name: &str,
    ) -> Result<Option<StorePath>, StoreError>;
}

/// An in-memory [Store].
///
/// Derivations and realisations are registered explicitly; nothing is ever
/// built. Both maps are kept behind a single [RwLock] each, reads vastly
/// outnumber writes in the hashing workload.
#[derive(Default)]
pub struct MemoryStore {
    derivations: RwLock<HashMap<StorePath, Derivation>>,
    realisations: RwLock<HashMap<(StorePath, String), StorePath>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derivation under the given store path.
    pub fn add_derivation(&self, drv_path: StorePath, drv: Derivation) {
        self.derivations.write().insert(drv_path, drv);
    }

    /// Record that `output_name` of the derivation at `drv_path` has been
    /// realized at `output_path`.
    pub fn add_realisation(&self, drv_path: StorePath, output_name: &str, output_path: StorePath) {
        self.realisations
            .write()
            .insert((drv_path, output_name.to_string()), output_path);
    }
}

impl Store for MemoryStore {
    fn query_derivation(&self, drv_path: &StorePath) -> Result<Option<Derivation>, StoreError> {
        Ok(self.derivations.read().get(drv_path).cloned())
    }

    fn query_output_path(
        &self,
        drv_path: &StorePath,
        output_name: &str,
    ) -> Result<Option<StorePath>, StoreError> {
        Ok(self
            .realisations
            .read()
            .get(&(drv_path.clone(), output_name.to_string()))
            .cloned())
    }
}
