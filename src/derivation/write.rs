//! This module implements the serialisation of derivations into the
//! [ATerm][] format, including the masked and input-replaced variants used
//! for hashing.
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html

use crate::aterm::escape_bytes;
use crate::derivation::output::DerivationOutput;
use crate::store_path::StorePath;
use bstr::BString;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::io::Write;

pub(crate) const DERIVATION_PREFIX: &str = "Derive";
pub(crate) const PAREN_OPEN: char = '(';
pub(crate) const PAREN_CLOSE: char = ')';
pub(crate) const BRACKET_OPEN: char = '[';
pub(crate) const BRACKET_CLOSE: char = ']';
pub(crate) const COMMA: char = ',';
pub(crate) const QUOTE: char = '"';

/// Something that can be written as the key of the input derivation map:
/// either a real store path, or the hex replacement standing in for it
/// while hashing.
pub(crate) trait AtermWriteable {
    fn aterm_write(&self, writer: &mut impl Write) -> io::Result<()>;
}

impl AtermWriteable for StorePath {
    fn aterm_write(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(self.to_absolute_path().as_bytes())
    }
}

impl AtermWriteable for String {
    fn aterm_write(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

pub(crate) fn write_char(writer: &mut impl Write, c: char) -> io::Result<()> {
    let mut buf = [0; 4];
    writer.write_all(c.encode_utf8(&mut buf).as_bytes())
}

pub(crate) fn write_str(writer: &mut impl Write, s: &str) -> io::Result<()> {
    writer.write_all(s.as_bytes())
}

/// Writes a list of elements, optionally quoting each, between the given
/// opening and closing characters. The elements are written as-is, so any
/// escaping must have happened before.
fn write_array_elements(
    writer: &mut impl Write,
    quote: bool,
    open: char,
    closing: char,
    elements: &[BString],
) -> io::Result<()> {
    write_char(writer, open)?;

    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            write_char(writer, COMMA)?;
        }

        if quote {
            write_char(writer, QUOTE)?;
        }

        writer.write_all(element)?;

        if quote {
            write_char(writer, QUOTE)?;
        }
    }

    write_char(writer, closing)?;

    Ok(())
}

/// Write the outputs map. Each output is a 4-tuple of output name, path,
/// `[r:]algo` and hex digest, with empty strings where a field doesn't
/// apply.
///
/// With `mask_outputs` set, all output paths are written as empty strings,
/// which is the form that gets hashed.
pub(crate) fn write_outputs(
    writer: &mut impl Write,
    drv_name: &str,
    outputs: &BTreeMap<String, DerivationOutput>,
    mask_outputs: bool,
) -> io::Result<()> {
    write_char(writer, BRACKET_OPEN)?;
    for (ii, (output_name, output)) in outputs.iter().enumerate() {
        if ii > 0 {
            write_char(writer, COMMA)?;
        }

        let path_str = if mask_outputs {
            String::new()
        } else {
            match output
                .path(drv_name, output_name)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            {
                Some(path) => path.to_absolute_path(),
                None => String::new(),
            }
        };

        let (method_algo, digest) = match output {
            DerivationOutput::InputAddressed(_) | DerivationOutput::Deferred => {
                (String::new(), String::new())
            }
            DerivationOutput::CAFixed(fixed) => {
                (fixed.method_algo(), fixed.hash.to_plain_hex_string())
            }
            DerivationOutput::CAFloating { method, hash_algo } => {
                (format!("{}{}", method.prefix(), hash_algo), String::new())
            }
        };

        write_array_elements(
            writer,
            true,
            PAREN_OPEN,
            PAREN_CLOSE,
            &[
                output_name.as_bytes().into(),
                path_str.into_bytes().into(),
                method_algo.into_bytes().into(),
                digest.into_bytes().into(),
            ],
        )?;
    }
    write_char(writer, BRACKET_CLOSE)?;

    Ok(())
}

pub(crate) fn write_input_derivations<K: AtermWriteable>(
    writer: &mut impl Write,
    input_derivations: &BTreeMap<K, BTreeSet<String>>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, BRACKET_OPEN)?;

    for (ii, (input_derivation_path, output_names)) in input_derivations.iter().enumerate() {
        if ii > 0 {
            write_char(writer, COMMA)?;
        }

        write_char(writer, PAREN_OPEN)?;
        write_char(writer, QUOTE)?;
        input_derivation_path.aterm_write(writer)?;
        write_char(writer, QUOTE)?;
        write_char(writer, COMMA)?;

        write_array_elements(
            writer,
            true,
            BRACKET_OPEN,
            BRACKET_CLOSE,
            &output_names
                .iter()
                .map(|s| s.as_bytes().into())
                .collect::<Vec<BString>>(),
        )?;

        write_char(writer, PAREN_CLOSE)?;
    }

    write_char(writer, BRACKET_CLOSE)?;

    Ok(())
}

pub(crate) fn write_input_sources(
    writer: &mut impl Write,
    input_sources: &BTreeSet<StorePath>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;

    write_array_elements(
        writer,
        true,
        BRACKET_OPEN,
        BRACKET_CLOSE,
        &input_sources
            .iter()
            .map(|s| s.to_absolute_path().into_bytes().into())
            .collect::<Vec<BString>>(),
    )?;

    Ok(())
}

pub(crate) fn write_system(writer: &mut impl Write, platform: &str) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, QUOTE)?;
    writer.write_all(&escape_bytes(platform.as_bytes()))?;
    write_char(writer, QUOTE)?;
    Ok(())
}

pub(crate) fn write_builder(writer: &mut impl Write, builder: &str) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, QUOTE)?;
    writer.write_all(&escape_bytes(builder.as_bytes()))?;
    write_char(writer, QUOTE)?;
    Ok(())
}

pub(crate) fn write_arguments(writer: &mut impl Write, arguments: &[String]) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_array_elements(
        writer,
        true,
        BRACKET_OPEN,
        BRACKET_CLOSE,
        &arguments
            .iter()
            .map(|s| escape_bytes(s.as_bytes()).into())
            .collect::<Vec<BString>>(),
    )?;

    Ok(())
}

/// Write the environment. If `masked_keys` is passed, values whose key
/// names an output are written as empty strings, which removes the
/// not-yet-calculated output paths from the hashed form.
pub(crate) fn write_environment(
    writer: &mut impl Write,
    environment: &BTreeMap<String, BString>,
    masked_keys: Option<&BTreeMap<String, DerivationOutput>>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, BRACKET_OPEN)?;

    for (i, (k, v)) in environment.iter().enumerate() {
        if i > 0 {
            write_char(writer, COMMA)?;
        }

        let value: &[u8] = match masked_keys {
            Some(outputs) if outputs.contains_key(k) => b"",
            _ => v.as_slice(),
        };

        write_array_elements(
            writer,
            true,
            PAREN_OPEN,
            PAREN_CLOSE,
            &[
                escape_bytes(k.as_bytes()).into(),
                escape_bytes(value).into(),
            ],
        )?;
    }

    write_char(writer, BRACKET_CLOSE)?;

    Ok(())
}
