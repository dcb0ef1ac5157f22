use crate::nixbase32;
use crate::nixhash::{FileIngestionMethod, FixedOutputHash, NixHash};
use crate::store_path::{Error, StorePath, STORE_DIR};
use sha2::{Digest, Sha256};
use thiserror;

/// Errors that can occur when creating a content-addressed store path.
///
/// This wraps the main [crate::store_path::Error].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildStorePathError {
    #[error("Invalid Store Path: {0}")]
    InvalidStorePath(Error),
    /// This error occurs when we have references outside the SHA-256 +
    /// Recursive case. The restriction comes from upstream Nix. It may be
    /// lifted at some point but there isn't a pressing need to anticipate that.
    #[error("References were not supported as much as requested")]
    InvalidReference(),
}

/// compress_hash takes an arbitrarily long sequence of bytes (usually
/// a hash digest), and returns a sequence of bytes of length
/// OUTPUT_SIZE.
///
/// It's calculated by rotating through the bytes in the output buffer
/// (zero-initialized), and XOR'ing with each byte of the passed
/// input. It consumes 1 byte at a time, and XOR's it with the current
/// value in the output buffer.
pub fn compress_hash<const OUTPUT_SIZE: usize>(input: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut output = [0; OUTPUT_SIZE];

    for (ii, ch) in input.iter().enumerate() {
        output[ii % OUTPUT_SIZE] ^= ch;
    }

    output
}

/// This builds a store path by calculating the text hash string of either a
/// derivation or a literal text file that may contain references.
///
/// Text paths may carry references, but never reference themselves.
pub fn make_text_path<S: AsRef<str>, I: IntoIterator<Item = S>, C: AsRef<[u8]>>(
    name: &str,
    content: C,
    references: I,
) -> Result<StorePath, Error> {
    // produce the sha256 digest of the contents
    let content_digest = Sha256::new_with_prefix(content).finalize().into();

    build_store_path_from_fingerprint_parts(
        &make_references_string("text", references),
        &NixHash::Sha256(content_digest),
        name,
    )
}

/// This builds the store path of a fixed-output derivation output, from the
/// a-priori hash the derivation promises for it.
///
/// Only in the Recursive + SHA-256 case does the promised hash enter the
/// fingerprint directly ("source:"). All other method/algo combinations go
/// through an inner "fixed:out:…" hash first, and may not carry references.
pub fn make_fixed_output_path<S: AsRef<str>, I: IntoIterator<Item = S>>(
    name: &str,
    fixed: &FixedOutputHash,
    references: I,
) -> Result<StorePath, BuildStorePathError> {
    match (&fixed.method, &fixed.hash) {
        (FileIngestionMethod::Recursive, NixHash::Sha256(_)) => {
            build_store_path_from_fingerprint_parts(
                &make_references_string("source", references),
                &fixed.hash,
                name,
            )
            .map_err(BuildStorePathError::InvalidStorePath)
        }
        _ => {
            if references.into_iter().next().is_some() {
                return Err(BuildStorePathError::InvalidReference());
            }
            build_store_path_from_fingerprint_parts(
                "output:out",
                &NixHash::Sha256(
                    Sha256::new_with_prefix(format!(
                        "fixed:out:{}{}:",
                        fixed.method.prefix(),
                        fixed.hash.to_nix_hex_string()
                    ))
                    .finalize()
                    .into(),
                ),
                name,
            )
            .map_err(BuildStorePathError::InvalidStorePath)
        }
    }
}

/// This builds an input-addressed store path.
///
/// Input-addressed store paths are always derivation outputs, the "input" in
/// question is the derivation and its closure, condensed into `drv_hash`.
pub fn make_output_path(
    drv_hash: &NixHash,
    output_name: &str,
    output_path_name: &str,
) -> Result<StorePath, Error> {
    build_store_path_from_fingerprint_parts(
        &(String::from("output:") + output_name),
        drv_hash,
        output_path_name,
    )
}

/// This builds a store path from fingerprint parts.
/// Usually, that function is used from [make_text_path] and
/// passed a "text hash string" (starting with "text:" as fingerprint),
/// but other fingerprints starting with "output:" are also used in Derivation
/// output path calculation.
///
/// The fingerprint is hashed with sha256, its digest is compressed to 20 bytes,
/// and nixbase32-encoded (32 characters).
fn build_store_path_from_fingerprint_parts<B: AsRef<[u8]>>(
    ty: &str,
    hash: &NixHash,
    name: B,
) -> Result<StorePath, Error> {
    let name = super::validate_name(name.as_ref())?;
    let fingerprint =
        String::from(ty) + ":" + &hash.to_nix_hex_string() + ":" + STORE_DIR + ":" + &name;
    let digest = Sha256::new_with_prefix(fingerprint).finalize();
    let compressed = compress_hash::<20>(&digest);

    Ok(StorePath {
        digest: compressed,
        name,
    })
}

/// Concatenates the type tag and the references, separated by `:`. The
/// result is the first field of the store path fingerprint.
fn make_references_string<S: AsRef<str>, I: IntoIterator<Item = S>>(
    ty: &str,
    references: I,
) -> String {
    let mut s = String::from(ty);

    for reference in references {
        s.push(':');
        s.push_str(reference.as_ref());
    }

    s
}

/// Nix placeholders (i.e. values returned by `builtins.placeholder`)
/// are used to populate outputs with paths that must be
/// string-replaced with the actual paths later, at runtime.
///
/// The actual placeholder is basically just a SHA256 hash encoded in
/// cppnix format.
pub fn hash_placeholder(name: &str) -> String {
    let digest = Sha256::new_with_prefix(format!("nix-output:{}", name)).finalize();

    format!("/{}", nixbase32::encode(&digest))
}
