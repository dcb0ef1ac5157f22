//! The "hash modulo" of a derivation: the identity hash that decides
//! output paths, which deliberately ignores irrelevant detail inside
//! fixed-output dependency subtrees.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::BitOrAssign;

use data_encoding::HEXLOWER;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::derivation::{output_path_name, Derivation, DerivationError, DerivationOutput};
use crate::store::{Store, StoreError};
use crate::store_path::{self, StorePath};

/// Whether a single hash already pins down the output paths, or whether
/// that is still deferred on some floating derivation in the input
/// closure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DrvHashKind {
    Regular,
    Deferred,
}

impl BitOrAssign for DrvHashKind {
    /// Deferredness is contagious: combining with a deferred input makes
    /// the result deferred.
    fn bitor_assign(&mut self, other: Self) {
        if other == DrvHashKind::Deferred {
            *self = DrvHashKind::Deferred;
        }
    }
}

/// The result of hashing a derivation modulo its fixed-output inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DrvHashModulo {
    /// A single hash stands for the whole derivation.
    DrvHash { hash: [u8; 32], kind: DrvHashKind },
    /// Fixed-output derivations dissolve into one hash per output, derived
    /// from the promised content hash only.
    CaOutputHashes(BTreeMap<String, [u8; 32]>),
}

/// Memo table mapping `.drv` store paths to their already-computed
/// [DrvHashModulo].
///
/// The computation is pure, so a racing double-computation of the same key
/// is benign, both threads produce identical values. Entries are never
/// mutated after insertion.
#[derive(Default)]
pub struct DrvHashes {
    memo: Mutex<HashMap<StorePath, DrvHashModulo>>,
}

impl DrvHashes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, drv_path: &StorePath) -> Option<DrvHashModulo> {
        self.memo.lock().get(drv_path).cloned()
    }

    pub fn insert(&self, drv_path: StorePath, hash: DrvHashModulo) {
        self.memo.lock().entry(drv_path).or_insert(hash);
    }
}

/// Errors that can occur while hashing a derivation.
#[derive(Debug, Error)]
pub enum DrvHashError {
    #[error("input derivation {0} is not in the store")]
    DanglingInputDerivation(StorePath),
    #[error("input derivation {0} does not have an output named {1}")]
    MissingInputDerivationOutput(StorePath, String),
    #[error("input derivation cycle through {0}")]
    CyclicInputDerivation(StorePath),
    #[error("derivation hash of {0} is still deferred")]
    DeferredDrvHash(String),
    #[error("invalid derivation: {0}")]
    InvalidDerivation(#[from] DerivationError),
    #[error("unable to build output path: {0}")]
    InvalidOutputPath(#[from] store_path::BuildStorePathError),
    #[error("unable to serialize: {0}")]
    Serialize(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Calculate the hash of a derivation modulo fixed-output input
/// derivations.
///
/// Fixed-output derivations dissolve into per-output hashes over nothing
/// but the promised content hash and the resulting path, so a change to
/// e.g. their builder does not ripple through the graph. All other
/// derivations are hashed over their (masked, if requested) ATerm form,
/// with every input derivation path replaced by the hex form of that
/// input's own recursively-computed hash.
///
/// Already-computed hashes of input derivations are looked up in (and
/// missing ones inserted into) `drv_hashes`.
#[instrument(skip_all, fields(drv.name=%drv.name), err)]
pub fn hash_derivation_modulo(
    store: &dyn Store,
    drv_hashes: &DrvHashes,
    drv: &Derivation,
    mask_outputs: bool,
) -> Result<DrvHashModulo, DrvHashError> {
    let mut visiting = HashSet::new();
    hash_derivation_modulo_inner(store, drv_hashes, drv, mask_outputs, &mut visiting)
}

fn hash_derivation_modulo_inner(
    store: &dyn Store,
    drv_hashes: &DrvHashes,
    drv: &Derivation,
    mask_outputs: bool,
    visiting: &mut HashSet<StorePath>,
) -> Result<DrvHashModulo, DrvHashError> {
    let drv_type = drv.derivation_type()?;

    // Fixed-output derivations short-circuit into per-output hashes.
    if drv_type.is_fixed() {
        let mut output_hashes = BTreeMap::new();
        for (output_name, output) in &drv.outputs {
            let fixed = match output {
                DerivationOutput::CAFixed(fixed) => fixed,
                // ruled out by the classification above
                _ => continue,
            };

            let path = store_path::make_fixed_output_path(
                &output_path_name(&drv.name, output_name),
                fixed,
                Vec::<String>::new(),
            )?;

            let fingerprint = format!(
                "fixed:out:{}:{}:{}",
                fixed.method_algo(),
                fixed.hash.to_plain_hex_string(),
                path.to_absolute_path()
            );

            output_hashes.insert(
                output_name.clone(),
                Sha256::new_with_prefix(fingerprint).finalize().into(),
            );
        }
        return Ok(DrvHashModulo::CaOutputHashes(output_hashes));
    }

    let mut kind = if drv_type.is_impure() {
        DrvHashKind::Deferred
    } else {
        DrvHashKind::Regular
    };

    // Replace input derivation paths by the hex form of their own hash
    // modulo.
    let mut replaced_inputs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (input_drv_path, output_names) in &drv.input_derivations {
        match path_derivation_modulo(store, drv_hashes, input_drv_path, visiting)? {
            DrvHashModulo::DrvHash { hash, kind: k } => {
                kind |= k;
                replaced_inputs.insert(HEXLOWER.encode(&hash), output_names.clone());
            }
            DrvHashModulo::CaOutputHashes(output_hashes) => {
                // Each consumed output enters as its own pseudo-derivation
                // with a single "out" output.
                let just_out = BTreeSet::from(["out".to_string()]);
                for output_name in output_names {
                    let h = output_hashes.get(output_name).ok_or_else(|| {
                        DrvHashError::MissingInputDerivationOutput(
                            input_drv_path.clone(),
                            output_name.clone(),
                        )
                    })?;
                    replaced_inputs.insert(HEXLOWER.encode(h), just_out.clone());
                }
            }
        }
    }

    let aterm = drv.to_aterm_bytes_with_replacements(mask_outputs, &replaced_inputs)?;

    Ok(DrvHashModulo::DrvHash {
        hash: Sha256::new_with_prefix(aterm).finalize().into(),
        kind,
    })
}

/// Memoized hash of the derivation stored at `drv_path`.
///
/// Input derivations are hashed with their output paths in place
/// (unmasked).
fn path_derivation_modulo(
    store: &dyn Store,
    drv_hashes: &DrvHashes,
    drv_path: &StorePath,
    visiting: &mut HashSet<StorePath>,
) -> Result<DrvHashModulo, DrvHashError> {
    if let Some(hash) = drv_hashes.get(drv_path) {
        return Ok(hash);
    }

    // The reference graph is acyclic by construction, this guards against
    // corrupt input rather than a legal state.
    if !visiting.insert(drv_path.clone()) {
        return Err(DrvHashError::CyclicInputDerivation(drv_path.clone()));
    }

    debug!(drv_path=%drv_path, "hashing input derivation");

    let drv = store
        .query_derivation(drv_path)?
        .ok_or_else(|| DrvHashError::DanglingInputDerivation(drv_path.clone()))?;

    let hash = hash_derivation_modulo_inner(store, drv_hashes, &drv, false, visiting)?;

    visiting.remove(drv_path);
    drv_hashes.insert(drv_path.clone(), hash.clone());

    Ok(hash)
}

/// The per-output identity hashes of a derivation whose output paths are
/// statically known.
///
/// Fails if the derivation's identity is still deferred on an unbuilt
/// floating input; callers must resolve first.
pub fn static_output_hashes(
    store: &dyn Store,
    drv_hashes: &DrvHashes,
    drv: &Derivation,
) -> Result<BTreeMap<String, [u8; 32]>, DrvHashError> {
    match hash_derivation_modulo(store, drv_hashes, drv, true)? {
        DrvHashModulo::DrvHash { hash, kind } => {
            if kind == DrvHashKind::Deferred {
                return Err(DrvHashError::DeferredDrvHash(drv.name.clone()));
            }
            Ok(drv
                .output_names()
                .map(|output_name| (output_name.clone(), hash))
                .collect())
        }
        DrvHashModulo::CaOutputHashes(output_hashes) => Ok(output_hashes),
    }
}
