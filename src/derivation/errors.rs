//! Contains [DerivationError], exported as [crate::derivation::DerivationError]
use crate::nixhash;
use crate::store_path;
use thiserror::Error;

/// Errors that can occur during the validation of Derivation structs.
#[derive(Debug, Error, PartialEq)]
pub enum DerivationError {
    // outputs
    #[error("no outputs defined")]
    NoOutputs(),
    #[error("invalid output name: {0}")]
    InvalidOutputName(String),
    #[error("encountered fixed-output derivation, but more than 1 output in total")]
    MoreThanOneOutputButFixed(),
    #[error("invalid output name for fixed-output derivation: {0}")]
    InvalidOutputNameForFixed(String),
    #[error("outputs mix multiple addressing categories")]
    MixedOutputTypes(),
    #[error("floating outputs use more than one hash algo")]
    MixedFloatingHashAlgos(),
    #[error("unable to validate output {0}: {1}")]
    InvalidOutput(String, OutputError),
    #[error("unable to build output path for {0}: {1}")]
    InvalidOutputDerivationPath(String, store_path::BuildStorePathError),

    // input derivations
    #[error("input derivation {0} doesn't end with .drv")]
    InvalidInputDerivationPrefix(String),
    #[error("input derivation {0} output names are empty")]
    EmptyInputDerivationOutputNames(String),
    #[error("input derivation {0} output name {1} is invalid")]
    InvalidInputDerivationOutputName(String, String),

    // platform
    #[error("invalid platform field: {0}")]
    InvalidPlatform(String),

    // builder
    #[error("invalid builder field: {0}")]
    InvalidBuilder(String),

    // environment
    #[error("invalid environment key {0}")]
    InvalidEnvironmentKey(String),

    // derivation path calculation
    #[error("unable to serialize: {0}")]
    InvalidSerialization(String),
    #[error("unable to build derivation path: {0}")]
    InvalidDerivationPath(store_path::Error),
}

/// Errors that can occur while constructing or validating a single
/// [crate::derivation::DerivationOutput].
#[derive(Debug, Error, PartialEq)]
pub enum OutputError {
    #[error("invalid output path {0}: {1}")]
    InvalidOutputPath(String, store_path::Error),
    #[error("unexpected output path {0} for an output without a known path")]
    UnexpectedOutputPath(String),
    #[error("digest present, but no hash algo")]
    DigestWithoutAlgo,
    #[error("invalid hash: {0}")]
    InvalidHash(nixhash::Error),
}
