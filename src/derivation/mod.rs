//! The derivation data model: outputs and their addressing modes, the
//! instruction fields (builder, arguments, environment), references to
//! other derivations, and the identity calculations defined over all of
//! that.

use bstr::BString;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::ops::{Deref, DerefMut};

use crate::nixbase32;
use crate::store_path::{self, StorePath};

mod drv_hash;
mod errors;
mod output;
mod parse_error;
mod parser;
mod resolve;
mod validate;
mod write;

#[cfg(test)]
mod tests;

pub use drv_hash::{
    hash_derivation_modulo, static_output_hashes, DrvHashError, DrvHashKind, DrvHashModulo,
    DrvHashes,
};
pub use errors::{DerivationError, OutputError};
pub use output::DerivationOutput;
pub use parser::Error as ParserError;
pub use resolve::ResolveError;

/// The extension every derivation store path carries.
pub const DRV_EXTENSION: &str = ".drv";

/// A derivation without references to other derivations: everything needed
/// to run one build, assuming all inputs are already present in the store.
///
/// This is the shape a derivation has after [Derivation::try_resolve], and
/// what an external builder consumes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BasicDerivation {
    pub name: String,

    pub outputs: BTreeMap<String, DerivationOutput>,

    #[serde(rename = "inputSrcs")]
    pub input_sources: BTreeSet<StorePath>,

    pub system: String,

    pub builder: String,

    #[serde(rename = "args")]
    pub arguments: Vec<String>,

    #[serde(rename = "env")]
    pub environment: BTreeMap<String, BString>,
}

/// A [BasicDerivation] plus references to other derivations: for each
/// referenced `.drv` path, the set of its output names that are consumed.
///
/// The reference graph is acyclic by construction, a derivation can only
/// refer to derivations that already existed when it was instantiated.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    #[serde(flatten)]
    pub basic: BasicDerivation,

    #[serde(rename = "inputDrvs")]
    pub input_derivations: BTreeMap<StorePath, BTreeSet<String>>,
}

impl Deref for Derivation {
    type Target = BasicDerivation;

    fn deref(&self) -> &Self::Target {
        &self.basic
    }
}

impl DerefMut for Derivation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.basic
    }
}

impl From<BasicDerivation> for Derivation {
    fn from(basic: BasicDerivation) -> Self {
        Derivation {
            basic,
            input_derivations: BTreeMap::new(),
        }
    }
}

/// The category a derivation falls into, derived from the addressing modes
/// of its outputs. Mixing categories inside one derivation is rejected by
/// [BasicDerivation::derivation_type].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DerivationType {
    InputAddressed,
    DeferredInputAddressed,
    CAFixed,
    CAFloating,
}

impl DerivationType {
    /// Whether the output paths are content-addressed.
    pub fn is_ca(&self) -> bool {
        matches!(self, DerivationType::CAFixed | DerivationType::CAFloating)
    }

    /// Whether the output hashes are known a priori.
    pub fn is_fixed(&self) -> bool {
        matches!(self, DerivationType::CAFixed)
    }

    /// Floating builds can't be fully sandboxed, their output hash is only
    /// known once the build ran.
    pub fn is_impure(&self) -> bool {
        matches!(self, DerivationType::CAFloating)
    }

    /// Whether all output paths can be calculated without building
    /// anything.
    pub fn has_known_output_paths(&self) -> bool {
        matches!(self, DerivationType::InputAddressed | DerivationType::CAFixed)
    }
}

impl BasicDerivation {
    /// Classify this derivation by inspecting the addressing mode of each
    /// output. Fails for an empty output set, for a mixture of categories,
    /// and for fixed-output derivations that are not a single output named
    /// `out`.
    pub fn derivation_type(&self) -> Result<DerivationType, DerivationError> {
        let mut input_addressed = 0usize;
        let mut fixed = 0usize;
        let mut floating = 0usize;
        let mut deferred = 0usize;
        let mut floating_hash_algo = None;

        for (output_name, output) in &self.outputs {
            match output {
                DerivationOutput::InputAddressed(_) => input_addressed += 1,
                DerivationOutput::CAFixed(_) => {
                    if self.outputs.len() > 1 {
                        return Err(DerivationError::MoreThanOneOutputButFixed());
                    }
                    if output_name != "out" {
                        return Err(DerivationError::InvalidOutputNameForFixed(
                            output_name.to_string(),
                        ));
                    }
                    fixed += 1;
                }
                DerivationOutput::CAFloating { hash_algo, .. } => {
                    match floating_hash_algo {
                        None => floating_hash_algo = Some(*hash_algo),
                        Some(algo) if algo == *hash_algo => {}
                        Some(_) => return Err(DerivationError::MixedFloatingHashAlgos()),
                    }
                    floating += 1;
                }
                DerivationOutput::Deferred => deferred += 1,
            }
        }

        match (input_addressed, fixed, floating, deferred) {
            (0, 0, 0, 0) => Err(DerivationError::NoOutputs()),
            (_, 0, 0, 0) => Ok(DerivationType::InputAddressed),
            (0, _, 0, 0) => Ok(DerivationType::CAFixed),
            (0, 0, _, 0) => Ok(DerivationType::CAFloating),
            (0, 0, 0, _) => Ok(DerivationType::DeferredInputAddressed),
            _ => Err(DerivationError::MixedOutputTypes()),
        }
    }

    /// The names of all outputs.
    pub fn output_names(&self) -> impl Iterator<Item = &String> {
        self.outputs.keys()
    }

    /// Returns, for each output, the [DerivationOutput] and its store path,
    /// if one can be known statically.
    pub fn outputs_and_opt_paths(
        &self,
    ) -> Result<BTreeMap<String, (DerivationOutput, Option<StorePath>)>, DerivationError> {
        let mut res = BTreeMap::new();
        for (output_name, output) in &self.outputs {
            let opt_path = output.path(&self.name, output_name).map_err(|e| {
                DerivationError::InvalidOutputDerivationPath(output_name.to_string(), e)
            })?;
            res.insert(output_name.to_string(), (output.clone(), opt_path));
        }
        Ok(res)
    }

    /// Builders starting with `builtin:` are handled inside the builder
    /// process itself, without executing anything from the store.
    pub fn is_builtin(&self) -> bool {
        self.builder.starts_with("builtin:")
    }
}

impl Derivation {
    /// Parse a [Derivation] from its ATerm serialization, and validate it.
    ///
    /// The name is not part of the serialization, it's carried by the
    /// `.drv` store path the bytes were read from.
    pub fn from_aterm_bytes<'a>(
        name: &str,
        b: &'a [u8],
    ) -> Result<Derivation, ParserError<&'a [u8]>> {
        parser::parse(b, name)
    }

    /// Write the Derivation to the given writer, in ATerm format.
    pub fn serialize(&self, writer: &mut impl io::Write) -> io::Result<()> {
        self.serialize_with_replacements(writer, false, &self.input_derivations)
    }

    /// Write the Derivation to the given writer, with the given masking and
    /// the input derivation map replaced by arbitrary writeable keys. This
    /// is what the identity hashes are calculated over.
    pub(crate) fn serialize_with_replacements<K: write::AtermWriteable>(
        &self,
        writer: &mut impl io::Write,
        mask_outputs: bool,
        input_derivations: &BTreeMap<K, BTreeSet<String>>,
    ) -> io::Result<()> {
        write::write_str(writer, write::DERIVATION_PREFIX)?;
        write::write_char(writer, write::PAREN_OPEN)?;

        write::write_outputs(writer, &self.name, &self.outputs, mask_outputs)?;
        write::write_input_derivations(writer, input_derivations)?;
        write::write_input_sources(writer, &self.input_sources)?;
        write::write_system(writer, &self.system)?;
        write::write_builder(writer, &self.builder)?;
        write::write_arguments(writer, &self.arguments)?;
        write::write_environment(
            writer,
            &self.environment,
            mask_outputs.then_some(&self.outputs),
        )?;

        write::write_char(writer, write::PAREN_CLOSE)?;

        Ok(())
    }

    /// Return the ATerm serialization as bytes.
    ///
    /// Serialization can fail if a fixed output path can't be constructed,
    /// e.g. because the name would be invalid as a store path name.
    pub fn to_aterm_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        self.serialize(&mut buffer)?;
        Ok(buffer)
    }

    pub(crate) fn to_aterm_bytes_with_replacements(
        &self,
        mask_outputs: bool,
        input_derivations: &BTreeMap<String, BTreeSet<String>>,
    ) -> io::Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        self.serialize_with_replacements(&mut buffer, mask_outputs, input_derivations)?;
        Ok(buffer)
    }

    /// Returns the `.drv` store path of this [Derivation].
    ///
    /// That's the text path of the ATerm serialization, under the name with
    /// a [DRV_EXTENSION] suffix, referencing all input sources and input
    /// derivation paths.
    pub fn calculate_derivation_path(&self) -> Result<StorePath, DerivationError> {
        let name = format!("{}{}", self.name, DRV_EXTENSION);

        // input sources and input derivation paths are the references of
        // the text file, both already sorted through their BTree homes.
        let references: BTreeSet<String> = self
            .input_sources
            .iter()
            .chain(self.input_derivations.keys())
            .map(StorePath::to_absolute_path)
            .collect();

        let aterm = self
            .to_aterm_bytes()
            .map_err(|e| DerivationError::InvalidSerialization(e.to_string()))?;

        store_path::make_text_path(&name, aterm, references)
            .map_err(DerivationError::InvalidDerivationPath)
    }
}

/// Checks whether a file name looks like a derivation, by naming
/// convention.
pub fn is_derivation(file_name: &str) -> bool {
    file_name.ends_with(DRV_EXTENSION)
}

/// Membership test against a requested-output set, with the convention
/// that an empty set means all outputs are wanted.
pub fn want_output(output_name: &str, wanted_outputs: &BTreeSet<String>) -> bool {
    wanted_outputs.is_empty() || wanted_outputs.contains(output_name)
}

/// The name of an output's store path: the derivation name, plus a dash
/// and the output name for everything except `out`.
pub fn output_path_name(drv_name: &str, output_name: &str) -> String {
    let mut res = drv_name.to_string();
    if output_name != "out" {
        res.push('-');
        res.push_str(output_name);
    }
    res
}

/// An opaque token standing in for the not-yet-known output path of an
/// (unbuilt) input derivation.
///
/// It is derived from the input derivation's store path and the output
/// name, so distinct (path, output) pairs yield distinct tokens. The
/// leading slash keeps it from ever being a valid store path, a real path
/// continues with the store directory.
pub fn downstream_placeholder(drv_path: &StorePath, output_name: &str) -> String {
    let drv_name = drv_path
        .name
        .strip_suffix(DRV_EXTENSION)
        .unwrap_or(&drv_path.name);

    let clear_text = format!(
        "nix-upstream-output:{}:{}",
        drv_path.hash_part(),
        output_path_name(drv_name, output_name)
    );

    format!(
        "/{}",
        nixbase32::encode(&Sha256::new_with_prefix(clear_text).finalize())
    )
}
