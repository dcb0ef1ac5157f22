use crate::derivation::{output_path_name, OutputError};
use crate::nixhash::{self, FileIngestionMethod, FixedOutputHash, HashAlgo};
use crate::store_path::{self, StorePath};
use serde::{Deserialize, Serialize};

/// How a single derivation output is addressed.
///
/// The four modes are mutually exclusive per output, and within one
/// derivation all outputs must fall into the same category (checked by
/// [crate::derivation::BasicDerivation::derivation_type]).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DerivationOutput {
    /// The output path was calculated up front, from the derivation's own
    /// identity hash.
    InputAddressed(StorePath),
    /// The content of the output is pinned a priori, the path is a pure
    /// function of that promised hash.
    CAFixed(FixedOutputHash),
    /// Content-addressed, but the hash is only known after the build.
    CAFloating {
        method: FileIngestionMethod,
        hash_algo: HashAlgo,
    },
    /// Input-addressed, but the path can't be calculated yet, because it
    /// depends on an (unbuilt) floating sub-derivation.
    Deferred,
}

impl DerivationOutput {
    /// Returns the store path of this output, if one can be known statically.
    ///
    /// For [DerivationOutput::InputAddressed] that's the stored path, for
    /// [DerivationOutput::CAFixed] it's calculated from the promised hash.
    /// Floating and deferred outputs have no path yet.
    pub fn path(
        &self,
        drv_name: &str,
        output_name: &str,
    ) -> Result<Option<StorePath>, store_path::BuildStorePathError> {
        match self {
            DerivationOutput::InputAddressed(path) => Ok(Some(path.clone())),
            DerivationOutput::CAFixed(fixed) => Ok(Some(store_path::make_fixed_output_path(
                &output_path_name(drv_name, output_name),
                fixed,
                Vec::<String>::new(),
            )?)),
            DerivationOutput::CAFloating { .. } | DerivationOutput::Deferred => Ok(None),
        }
    }

    /// Whether this output is fixed (carries an a-priori content hash).
    pub fn is_fixed(&self) -> bool {
        matches!(self, DerivationOutput::CAFixed(_))
    }

    /// Constructs a [DerivationOutput] from the three fields following the
    /// output name in the ATerm representation: the output path, the
    /// `[r:]algo` string, and the lower-hex digest.
    ///
    /// Absence is expressed by empty strings, and which combinations of
    /// empty and non-empty fields are allowed determines the addressing
    /// mode.
    pub(crate) fn from_aterm_fields(
        path: &str,
        method_algo: &str,
        hex_digest: &[u8],
    ) -> Result<Self, OutputError> {
        if method_algo.is_empty() {
            if !hex_digest.is_empty() {
                return Err(OutputError::DigestWithoutAlgo);
            }
            if path.is_empty() {
                return Ok(DerivationOutput::Deferred);
            }
            let path = StorePath::from_absolute_path(path.as_bytes())
                .map_err(|e| OutputError::InvalidOutputPath(path.to_string(), e))?;
            Ok(DerivationOutput::InputAddressed(path))
        } else if hex_digest.is_empty() {
            // floating outputs carry no path in the serialization.
            if !path.is_empty() {
                return Err(OutputError::UnexpectedOutputPath(path.to_string()));
            }
            let (method, algo_str) = nixhash::split_method_algo(method_algo);
            let hash_algo = HashAlgo::try_from(algo_str).map_err(OutputError::InvalidHash)?;
            Ok(DerivationOutput::CAFloating { method, hash_algo })
        } else {
            // the path is recomputed from the hash, but a non-empty field
            // still needs to be a store path, garbage must not round-trip.
            if !path.is_empty() {
                StorePath::from_absolute_path(path.as_bytes())
                    .map_err(|e| OutputError::InvalidOutputPath(path.to_string(), e))?;
            }
            let fixed = FixedOutputHash::from_method_algo_hex(method_algo, hex_digest)
                .map_err(OutputError::InvalidHash)?;
            Ok(DerivationOutput::CAFixed(fixed))
        }
    }
}

/// The representation used for (JSON) serialization of a
/// [DerivationOutput]: up to three string fields, all optional.
#[derive(Serialize, Deserialize)]
struct OutputRepr {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<StorePath>,
    #[serde(rename = "hashAlgo", skip_serializing_if = "Option::is_none")]
    hash_algo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl Serialize for DerivationOutput {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            DerivationOutput::InputAddressed(path) => OutputRepr {
                path: Some(path.clone()),
                hash_algo: None,
                hash: None,
            },
            DerivationOutput::CAFixed(fixed) => OutputRepr {
                path: None,
                hash_algo: Some(fixed.method_algo()),
                hash: Some(fixed.hash.to_plain_hex_string()),
            },
            DerivationOutput::CAFloating { method, hash_algo } => OutputRepr {
                path: None,
                hash_algo: Some(format!("{}{}", method.prefix(), hash_algo)),
                hash: None,
            },
            DerivationOutput::Deferred => OutputRepr {
                path: None,
                hash_algo: None,
                hash: None,
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DerivationOutput {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = OutputRepr::deserialize(deserializer)?;
        match repr {
            OutputRepr {
                path: Some(path),
                hash_algo: None,
                hash: None,
            } => Ok(DerivationOutput::InputAddressed(path)),
            OutputRepr {
                path: None,
                hash_algo: Some(method_algo),
                hash: Some(hex_digest),
            } => {
                let fixed =
                    FixedOutputHash::from_method_algo_hex(&method_algo, hex_digest.as_bytes())
                        .map_err(serde::de::Error::custom)?;
                Ok(DerivationOutput::CAFixed(fixed))
            }
            OutputRepr {
                path: None,
                hash_algo: Some(method_algo),
                hash: None,
            } => {
                let (method, algo_str) = nixhash::split_method_algo(&method_algo);
                let hash_algo =
                    HashAlgo::try_from(algo_str).map_err(serde::de::Error::custom)?;
                Ok(DerivationOutput::CAFloating { method, hash_algo })
            }
            OutputRepr {
                path: None,
                hash_algo: None,
                hash: None,
            } => Ok(DerivationOutput::Deferred),
            _ => Err(serde::de::Error::custom(
                "invalid combination of path, hashAlgo and hash fields",
            )),
        }
    }
}
