//! Turning a [Derivation] with pending references into a standalone
//! [BasicDerivation], once the referenced outputs have been built.

use std::collections::BTreeMap;

use bstr::{BString, ByteSlice};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::derivation::{
    downstream_placeholder, hash_derivation_modulo, output_path_name, BasicDerivation, Derivation,
    DerivationOutput, DrvHashError, DrvHashKind, DrvHashModulo, DrvHashes,
};
use crate::nixhash::NixHash;
use crate::store::{Store, StoreError};
use crate::store_path::{self, make_output_path};

/// Fatal errors during resolution. "Input not built yet" is not among
/// them, that's the `Ok(None)` case of [Derivation::try_resolve].
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    DrvHash(#[from] DrvHashError),
    #[error("derivation {0} is still deferred after resolving all inputs")]
    StillDeferred(String),
    #[error("unable to build output path for {0}: {1}")]
    InvalidOutputPath(String, store_path::Error),
}

impl Derivation {
    /// Try to produce a [BasicDerivation] that no longer references any
    /// input derivations.
    ///
    /// For every consumed output of every input derivation, the store is
    /// asked for the realized path. If any of them hasn't been built yet,
    /// this returns `Ok(None)`, the caller can retry after building.
    ///
    /// Otherwise the realized paths are moved into the input sources, all
    /// downstream placeholder tokens in builder, arguments and environment
    /// are replaced by the concrete path strings, and formerly deferred
    /// outputs get their input-addressed path assigned.
    #[instrument(skip_all, fields(drv.name=%self.name))]
    pub fn try_resolve(
        &self,
        store: &dyn Store,
        drv_hashes: &DrvHashes,
    ) -> Result<Option<BasicDerivation>, ResolveError> {
        let mut resolved = self.basic.clone();

        let mut input_rewrites: BTreeMap<String, String> = BTreeMap::new();

        for (input_drv_path, output_names) in &self.input_derivations {
            for output_name in output_names {
                let actual_path = match store.query_output_path(input_drv_path, output_name)? {
                    Some(path) => path,
                    None => {
                        debug!(drv_path=%input_drv_path, output_name, "output not realized yet");
                        return Ok(None);
                    }
                };

                input_rewrites.insert(
                    downstream_placeholder(input_drv_path, output_name),
                    actual_path.to_absolute_path(),
                );
                resolved.input_sources.insert(actual_path);
            }
        }

        rewrite_derivation(store, drv_hashes, &mut resolved, &input_rewrites)?;

        Ok(Some(resolved))
    }
}

/// Replace every occurrence of each rewrite key in the builder, arguments
/// and environment, then assign paths to all still-deferred outputs, whose
/// identity hash is now computable.
fn rewrite_derivation(
    store: &dyn Store,
    drv_hashes: &DrvHashes,
    drv: &mut BasicDerivation,
    rewrites: &BTreeMap<String, String>,
) -> Result<(), ResolveError> {
    drv.builder = rewrite_string(&drv.builder, rewrites);
    for arg in drv.arguments.iter_mut() {
        *arg = rewrite_string(arg, rewrites);
    }

    drv.environment = drv
        .environment
        .iter()
        .map(|(k, v)| (rewrite_string(k, rewrites), rewrite_bytes(v, rewrites)))
        .collect();

    if !drv
        .outputs
        .values()
        .any(|output| matches!(output, DerivationOutput::Deferred))
    {
        return Ok(());
    }

    // With the input derivations gone, the masked hash is final now.
    let standalone = Derivation::from(drv.clone());
    let drv_hash = match hash_derivation_modulo(store, drv_hashes, &standalone, true)? {
        DrvHashModulo::DrvHash {
            hash,
            kind: DrvHashKind::Regular,
        } => hash,
        _ => return Err(ResolveError::StillDeferred(drv.name.clone())),
    };

    for (output_name, output) in drv.outputs.iter_mut() {
        if matches!(output, DerivationOutput::Deferred) {
            let path = make_output_path(
                &NixHash::Sha256(drv_hash),
                output_name,
                &output_path_name(&drv.name, output_name),
            )
            .map_err(|e| ResolveError::InvalidOutputPath(output_name.clone(), e))?;

            drv.environment
                .insert(output_name.clone(), path.to_absolute_path().into());
            *output = DerivationOutput::InputAddressed(path);
        }
    }

    Ok(())
}

fn rewrite_string(s: &str, rewrites: &BTreeMap<String, String>) -> String {
    let mut res = s.to_string();
    for (from, to) in rewrites {
        res = res.replace(from.as_str(), to.as_str());
    }
    res
}

fn rewrite_bytes(v: &BString, rewrites: &BTreeMap<String, String>) -> BString {
    let mut res: Vec<u8> = v.to_vec();
    for (from, to) in rewrites {
        res = res.replace(from.as_bytes(), to.as_bytes());
    }
    res.into()
}
