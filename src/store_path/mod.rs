use crate::nixbase32::{self, Nixbase32DecodeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{cmp::Ordering, fmt, str::FromStr};
use thiserror;

mod utils;

pub use utils::*;

pub const DIGEST_SIZE: usize = 20;
pub const ENCODED_DIGEST_SIZE: usize = 32; // = nixbase32::encode_len(DIGEST_SIZE)

/// The store dir prefix, without trailing slash.
/// That's usually where the Nix store is mounted at.
pub const STORE_DIR: &str = "/nix/store";
pub const STORE_DIR_WITH_SLASH: &str = "/nix/store/";

/// Errors that can occur when parsing a literal store path
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("dash is missing between hash and name")]
    MissingDash,
    #[error("hash encoding is invalid: {0}")]
    InvalidHashEncoding(Nixbase32DecodeError),
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid name: {0:?}, character at position {1} is invalid")]
    InvalidName(String, usize),
    #[error("tried to parse an absolute path which was missing the store dir prefix")]
    MissingStoreDir,
}

/// Represents a path in the Nix store (a direct child of [STORE_DIR]).
///
/// It consists of a digest (20 bytes), and a name, which is a string.
/// The name may only contain ASCII alphanumerics, or one of the following
/// characters: `-`, `_`, `.`, `+`, `?`, `=`, and must not start with a dot.
///
/// Derivations are also store paths, their names just carry a `.drv`
/// suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorePath {
    pub digest: [u8; DIGEST_SIZE],
    pub name: String,
}

impl PartialOrd for StorePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorePath {
    /// Store paths are ordered by their string representation, so the
    /// nixbase32-encoded digest decides, not the raw digest bytes. The two
    /// orders differ, and this one is observable: BTree-backed maps keep
    /// ATerm serializations sorted the way the basenames sort.
    fn cmp(&self, other: &Self) -> Ordering {
        nixbase32::encode(&self.digest)
            .cmp(&nixbase32::encode(&other.digest))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl FromStr for StorePath {
    type Err = Error;

    /// Construct a [StorePath] by passing the `$digest-$name` string
    /// that comes after [STORE_DIR_WITH_SLASH].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl StorePath {
    /// Construct a [StorePath] by passing the `$digest-$name` string
    /// that comes after [STORE_DIR_WITH_SLASH].
    pub fn from_bytes(s: &[u8]) -> Result<StorePath, Error> {
        // the whole string needs to be at least:
        //
        // - 32 characters (encoded hash)
        // - 1 dash
        // - 1 character for the name
        if s.len() < ENCODED_DIGEST_SIZE + 2 {
            Err(Error::InvalidLength)?
        }

        let digest = nixbase32::decode_fixed(&s[..ENCODED_DIGEST_SIZE])
            .map_err(Error::InvalidHashEncoding)?;

        if s[ENCODED_DIGEST_SIZE] != b'-' {
            return Err(Error::MissingDash);
        }

        Ok(StorePath {
            digest,
            name: validate_name(&s[ENCODED_DIGEST_SIZE + 1..])?,
        })
    }

    /// Construct a [StorePath] from an absolute store path string.
    /// This is equivalent to calling [StorePath::from_bytes], but stripping
    /// the [STORE_DIR_WITH_SLASH] prefix before.
    pub fn from_absolute_path(s: &[u8]) -> Result<StorePath, Error> {
        match s.strip_prefix(STORE_DIR_WITH_SLASH.as_bytes()) {
            Some(s_stripped) => Self::from_bytes(s_stripped),
            None => Err(Error::MissingStoreDir),
        }
    }

    /// Construct a [StorePath] from a name and digest.
    pub fn from_name_and_digest(name: &str, digest: &[u8]) -> Result<StorePath, Error> {
        Ok(Self {
            name: validate_name(name.as_bytes())?,
            digest: digest.try_into().map_err(|_| Error::InvalidLength)?,
        })
    }

    /// The nixbase32-encoded digest, the part of the basename in front of
    /// the dash.
    pub fn hash_part(&self) -> String {
        nixbase32::encode(&self.digest)
    }

    /// Converts the [StorePath] to an absolute store path string,
    /// that is just the string representation, prefixed with the store
    /// prefix ([STORE_DIR_WITH_SLASH]).
    pub fn to_absolute_path(&self) -> String {
        format!("{}{}", STORE_DIR_WITH_SLASH, self)
    }
}

/// Checks a given &[u8] to match the restrictions for [StorePath::name], and
/// returns the name as string if successful.
pub(crate) fn validate_name(s: &[u8]) -> Result<String, Error> {
    // Empty names are not allowed.
    if s.is_empty() {
        return Err(Error::InvalidLength);
    }

    for (i, c) in s.iter().enumerate() {
        if c.is_ascii_alphanumeric()
            || (*c == b'.' && i != 0) // can't start with a dot
            || *c == b'-'
            || *c == b'_'
            || *c == b'+'
            || *c == b'?'
            || *c == b'='
        {
            continue;
        }

        return Err(Error::InvalidName(
            String::from_utf8_lossy(s).to_string(),
            i,
        ));
    }

    Ok(String::from_utf8(s.to_vec()).expect("name is ascii"))
}

impl fmt::Display for StorePath {
    /// The string representation of a store path starts with a digest (20
    /// bytes), [crate::nixbase32]-encoded, followed by a `-`,
    /// and ends with the name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", nixbase32::encode(&self.digest), self.name)
    }
}

impl Serialize for StorePath {
    /// Store paths are serialized as their absolute path string, which is
    /// the representation used in derivation JSON.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_absolute_path())
    }
}

impl<'de> Deserialize<'de> for StorePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = String::deserialize(deserializer)?;
        StorePath::from_absolute_path(s.as_bytes()).map_err(|e| {
            serde::de::Error::invalid_value(serde::de::Unexpected::Str(&s), &e.to_string().as_str())
        })
    }
}
