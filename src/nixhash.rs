//! Hashes as Nix knows them: an algorithm tag plus a digest, and the
//! "method:algo" pairing used for fixed-output derivations.

use std::fmt::Display;

use data_encoding::HEXLOWER;
use thiserror::Error;

/// The hash algorithms supported by cppnix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashAlgo {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgo {
    /// digest length in bytes
    pub fn digest_length(&self) -> usize {
        match self {
            HashAlgo::Md5 => 16,
            HashAlgo::Sha1 => 20,
            HashAlgo::Sha256 => 32,
            HashAlgo::Sha512 => 64,
        }
    }
}

impl Display for HashAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            HashAlgo::Md5 => write!(f, "md5"),
            HashAlgo::Sha1 => write!(f, "sha1"),
            HashAlgo::Sha256 => write!(f, "sha256"),
            HashAlgo::Sha512 => write!(f, "sha512"),
        }
    }
}

impl TryFrom<&str> for HashAlgo {
    type Error = Error;

    fn try_from(algo_str: &str) -> Result<Self, Self::Error> {
        match algo_str {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(Error::InvalidAlgo(algo_str.to_string())),
        }
    }
}

/// NixHash represents hashes known by Nix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NixHash {
    Md5([u8; 16]),
    Sha1([u8; 20]),
    Sha256([u8; 32]),
    Sha512(Box<[u8; 64]>),
}

impl NixHash {
    /// returns the algo as [HashAlgo].
    pub fn algo(&self) -> HashAlgo {
        match self {
            NixHash::Md5(_) => HashAlgo::Md5,
            NixHash::Sha1(_) => HashAlgo::Sha1,
            NixHash::Sha256(_) => HashAlgo::Sha256,
            NixHash::Sha512(_) => HashAlgo::Sha512,
        }
    }

    /// returns the digest as variable-length byte slice.
    pub fn digest_as_bytes(&self) -> &[u8] {
        match self {
            NixHash::Md5(digest) => digest,
            NixHash::Sha1(digest) => digest,
            NixHash::Sha256(digest) => digest,
            NixHash::Sha512(digest) => digest.as_ref(),
        }
    }

    /// Formats a [NixHash] in the Nix default hash format,
    /// which is the algo, followed by a colon, then the lower hex encoded digest.
    pub fn to_nix_hex_string(&self) -> String {
        format!("{}:{}", self.algo(), self.to_plain_hex_string())
    }

    /// Returns the digest as a hex string -- without any algorithm prefix.
    pub fn to_plain_hex_string(&self) -> String {
        HEXLOWER.encode(self.digest_as_bytes())
    }
}

impl TryFrom<(HashAlgo, &[u8])> for NixHash {
    type Error = Error;

    fn try_from(value: (HashAlgo, &[u8])) -> Result<Self, Error> {
        let (algo, digest) = value;
        from_algo_and_digest(algo, digest)
    }
}

/// Constructs a new [NixHash] by specifying [HashAlgo] and digest.
/// It can fail if the passed digest length doesn't match what's expected for
/// the passed algo.
pub fn from_algo_and_digest(algo: HashAlgo, digest: &[u8]) -> Result<NixHash, Error> {
    if digest.len() != algo.digest_length() {
        return Err(Error::InvalidDigestLength(digest.len(), algo));
    }

    Ok(match algo {
        HashAlgo::Md5 => NixHash::Md5(digest.try_into().unwrap()),
        HashAlgo::Sha1 => NixHash::Sha1(digest.try_into().unwrap()),
        HashAlgo::Sha256 => NixHash::Sha256(digest.try_into().unwrap()),
        HashAlgo::Sha512 => NixHash::Sha512(Box::new(digest.try_into().unwrap())),
    })
}

/// Describes how the contents of an output were hashed: as a flat file, or
/// as a serialized (NAR) file system tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileIngestionMethod {
    Flat,
    Recursive,
}

impl FileIngestionMethod {
    /// The prefix tacked in front of the hash algo wherever Nix renders a
    /// "method:algo" pair (derivation output fields, fingerprints).
    pub fn prefix(&self) -> &'static str {
        match self {
            FileIngestionMethod::Flat => "",
            FileIngestionMethod::Recursive => "r:",
        }
    }
}

/// The a-priori hash of a fixed-output derivation output: the ingestion
/// method, and the expected hash of the produced contents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixedOutputHash {
    pub method: FileIngestionMethod,
    pub hash: NixHash,
}

impl FixedOutputHash {
    /// Renders the `[r:]<algo>` string found in the third field of an
    /// output in ATerm notation.
    pub fn method_algo(&self) -> String {
        format!("{}{}", self.method.prefix(), self.hash.algo())
    }

    /// Parses a `[r:]<algo>` string plus a lower-hex encoded digest, the
    /// inverse of [Self::method_algo] and the hex digest field.
    pub fn from_method_algo_hex(method_algo: &str, hex_digest: &[u8]) -> Result<Self, Error> {
        let (method, algo_str) = split_method_algo(method_algo);
        let algo = HashAlgo::try_from(algo_str)?;
        let digest = HEXLOWER
            .decode(hex_digest)
            .map_err(Error::InvalidBase16Encoding)?;

        Ok(Self {
            method,
            hash: from_algo_and_digest(algo, &digest)?,
        })
    }
}

/// Splits a `[r:]<algo>` string into the ingestion method and the bare algo
/// string.
pub fn split_method_algo(s: &str) -> (FileIngestionMethod, &str) {
    match s.strip_prefix("r:") {
        Some(algo) => (FileIngestionMethod::Recursive, algo),
        None => (FileIngestionMethod::Flat, s),
    }
}

/// Errors related to NixHash construction.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum Error {
    #[error("invalid hash algo: {0}")]
    InvalidAlgo(String),
    #[error("invalid digest length {0} for algo {1}")]
    InvalidDigestLength(usize, HashAlgo),
    #[error("invalid base16 encoding: {0}")]
    InvalidBase16Encoding(data_encoding::DecodeError),
}
