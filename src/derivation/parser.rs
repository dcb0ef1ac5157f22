//! This module constructs a [Derivation] by parsing its [ATerm][]
//! serialization.
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html

use bstr::BString;
use nom::bytes::complete::tag;
use nom::character::complete::char as nomchar;
use nom::combinator::{all_consuming, map_res};
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::{delimited, preceded, separated_pair, terminated, tuple};
use std::collections::{BTreeMap, BTreeSet};
use thiserror;

use super::parse_error::{into_nomerror, ErrorKind, NomError, NomResult};
use super::{write, BasicDerivation, Derivation, DerivationOutput};
use crate::store_path::StorePath;
use crate::aterm;

#[derive(Debug, thiserror::Error)]
pub enum Error<I> {
    #[error("parsing error: {0:?}")]
    Parse(NomError<I>),
    #[error("premature EOF")]
    Incomplete,
    #[error("validation error: {0}")]
    Validation(super::DerivationError),
}

pub(crate) fn parse<'a>(i: &'a [u8], name: &str) -> Result<Derivation, Error<&'a [u8]>> {
    match all_consuming(parse_derivation)(i) {
        Ok((rest, mut derivation)) => {
            // this shouldn't happen, as all_consuming shouldn't return.
            debug_assert!(rest.is_empty());

            // the name is not part of the serialization, it comes from the
            // store path the bytes were read from.
            derivation.name = name.to_string();

            derivation.validate().map_err(Error::Validation)?;

            Ok(derivation)
        }
        Err(nom::Err::Incomplete(_)) => Err(Error::Incomplete),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(Error::Parse(e)),
    }
}

/// Parse one output in ATerm. This is 4 string fields inside parens:
/// output name, output path, algo (and mode), digest.
/// Returns the output name and [DerivationOutput].
fn parse_output(i: &[u8]) -> NomResult<&[u8], (String, DerivationOutput)> {
    delimited(
        nomchar('('),
        map_res(
            |i| {
                tuple((
                    terminated(aterm::parse_string_field, nomchar(',')),
                    terminated(aterm::parse_string_field, nomchar(',')),
                    terminated(aterm::parse_string_field, nomchar(',')),
                    aterm::parse_bstr_field,
                ))(i)
                .map_err(into_nomerror)
            },
            |(output_name, output_path, method_algo, encoded_digest)| {
                match DerivationOutput::from_aterm_fields(
                    &output_path,
                    &method_algo,
                    &encoded_digest,
                ) {
                    Ok(output) => Ok((output_name, output)),
                    Err(e) => Err(nom::Err::Failure(NomError {
                        input: i,
                        code: ErrorKind::InvalidOutput(e),
                    })),
                }
            },
        ),
        nomchar(')'),
    )(i)
}

/// Parse multiple outputs in ATerm. This is a list of things accepted by
/// parse_output, and takes care of turning the (String, DerivationOutput)
/// returned from it into a BTreeMap.
/// We don't use parse_kv here, as it's dealing with 2-tuples, and these are
/// 4-tuples.
fn parse_outputs(i: &[u8]) -> NomResult<&[u8], BTreeMap<String, DerivationOutput>> {
    let res = delimited(
        nomchar('['),
        separated_list1(tag(","), parse_output),
        nomchar(']'),
    )(i);

    match res {
        Ok((rst, outputs_lst)) => {
            let mut outputs: BTreeMap<String, DerivationOutput> = BTreeMap::default();
            for (output_name, output) in outputs_lst.into_iter() {
                if outputs.contains_key(&output_name) {
                    return Err(nom::Err::Failure(NomError {
                        input: i,
                        code: ErrorKind::DuplicateMapKey(output_name),
                    }));
                }
                outputs.insert(output_name, output);
            }
            Ok((rst, outputs))
        }
        // pass regular parse errors along
        Err(e) => Err(e),
    }
}

fn parse_input_derivations(i: &[u8]) -> NomResult<&[u8], BTreeMap<StorePath, BTreeSet<String>>> {
    let (rst, input_derivations_list) = parse_kv::<Vec<String>, _>(aterm::parse_str_list)(i)?;

    // This is a map of drv paths to a set of output names.
    let mut input_derivations: BTreeMap<StorePath, BTreeSet<String>> = BTreeMap::new();

    for (input_derivation, output_names) in input_derivations_list {
        let drv_path =
            StorePath::from_absolute_path(input_derivation.as_bytes()).map_err(|e| {
                nom::Err::Failure(NomError {
                    input: i,
                    code: ErrorKind::InvalidStorePath(e),
                })
            })?;

        let mut new_output_names = BTreeSet::new();
        for output_name in output_names.into_iter() {
            if !new_output_names.insert(output_name.clone()) {
                return Err(nom::Err::Failure(NomError {
                    input: i,
                    code: ErrorKind::DuplicateInputDerivationOutputName(
                        input_derivation.to_string(),
                        output_name.to_string(),
                    ),
                }));
            }
        }
        input_derivations.insert(drv_path, new_output_names);
    }

    Ok((rst, input_derivations))
}

fn parse_input_sources(i: &[u8]) -> NomResult<&[u8], BTreeSet<StorePath>> {
    let (rst, input_sources_lst) = aterm::parse_str_list(i).map_err(into_nomerror)?;

    let mut input_sources: BTreeSet<StorePath> = BTreeSet::new();
    for input_source in input_sources_lst.into_iter() {
        let path = StorePath::from_absolute_path(input_source.as_bytes()).map_err(|e| {
            nom::Err::Failure(NomError {
                input: i,
                code: ErrorKind::InvalidStorePath(e),
            })
        })?;
        if !input_sources.insert(path) {
            return Err(nom::Err::Failure(NomError {
                input: i,
                code: ErrorKind::DuplicateInputSource(input_source),
            }));
        }
    }

    Ok((rst, input_sources))
}

pub(crate) fn parse_derivation(i: &[u8]) -> NomResult<&[u8], Derivation> {
    use nom::Parser;
    preceded(
        tag(write::DERIVATION_PREFIX),
        delimited(
            // inside parens
            nomchar('('),
            // tuple requires all errors to be of the same type, so we need to be a
            // bit verbose here wrapping generic IResult into [NomResult].
            tuple((
                // parse outputs
                terminated(parse_outputs, nomchar(',')),
                // parse input derivations
                terminated(parse_input_derivations, nomchar(',')),
                // parse input sources
                terminated(parse_input_sources, nomchar(',')),
                // parse system
                |i| terminated(aterm::parse_string_field, nomchar(','))(i).map_err(into_nomerror),
                // parse builder
                |i| terminated(aterm::parse_string_field, nomchar(','))(i).map_err(into_nomerror),
                // parse arguments
                |i| terminated(aterm::parse_str_list, nomchar(','))(i).map_err(into_nomerror),
                // parse environment
                parse_kv::<BString, _>(aterm::parse_bstr_field),
            )),
            nomchar(')'),
        )
        .map(
            |(
                outputs,
                input_derivations,
                input_sources,
                system,
                builder,
                arguments,
                environment,
            )| {
                Derivation {
                    basic: BasicDerivation {
                        name: String::new(),
                        arguments,
                        builder,
                        environment,
                        input_sources,
                        outputs,
                        system,
                    },
                    input_derivations,
                }
            },
        ),
    )(i)
}

/// Parse a list of key/value pairs into a BTreeMap.
/// The parser for the values can be passed in.
/// In terms of ATerm, this is just a 2-tuple,
/// but we have the additional restriction that the first element needs to be
/// unique across all tuples.
pub(crate) fn parse_kv<'a, V, VF>(
    vf: VF,
) -> impl FnMut(&'a [u8]) -> NomResult<&'a [u8], BTreeMap<String, V>> + 'static
where
    VF: FnMut(&'a [u8]) -> nom::IResult<&'a [u8], V, nom::error::Error<&'a [u8]>> + Clone + 'static,
{
    move |i|
    // inside brackets
    delimited(
        nomchar('['),
        |ii| {
            let res = separated_list0(
                nomchar(','),
                // inside parens
                delimited(
                    nomchar('('),
                    separated_pair(
                        aterm::parse_string_field,
                        nomchar(','),
                        vf.clone(),
                    ),
                    nomchar(')'),
                ),
            )(ii).map_err(into_nomerror);

            match res {
                Ok((rest, pairs)) => {
                    let mut kvs: BTreeMap<String, V> = BTreeMap::new();
                    for (k, v) in pairs.into_iter() {
                        // collect the 2-tuple to a BTreeMap,
                        // and fail if the key was already seen before.
                        if kvs.insert(k.clone(), v).is_some() {
                            return Err(nom::Err::Failure(NomError {
                                input: i,
                                code: ErrorKind::DuplicateMapKey(k),
                            }));
                        }
                    }
                    Ok((rest, kvs))
                }
                Err(e) => Err(e),
            }
        },
        nomchar(']'),
    )(i)
}
