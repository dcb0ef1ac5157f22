//! Implements the slightly odd "base32" encoding that's used in Nix.
//!
//! Nix uses a custom alphabet. Contrary to other implementations (RFC4648),
//! encoding to "nix base32" doesn't use any padding, and reads in characters
//! in reverse order.
//!
//! This is also the main reason why we can't use `data_encoding::Encoding` -
//! it gets things wrong if there normally would be a need for padding.

use thiserror::Error;

const ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Inverse of [ALPHABET]: maps a byte to its 5-bit value, or 0xff if the
/// byte is not part of the alphabet.
const INV_ALPHABET: [u8; 256] = {
    let mut inv = [0xff_u8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        inv[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    inv
};

/// Errors that can occur while decoding nixbase32-encoded data.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum Nixbase32DecodeError {
    #[error("character {0:x} not in alphabet")]
    CharacterNotInAlphabet(u8),
    #[error("nonzero carry")]
    NonzeroCarry,
    #[error("invalid length")]
    InvalidLength,
}

/// Returns encoded input
pub fn encode(input: &[u8]) -> String {
    let output_len = encode_len(input.len());
    let mut output = String::with_capacity(output_len);

    // nixbase32 is encoded character by character, starting from the *last*
    // character, each one grabbing 5 bits from the input.
    for n in (0..output_len).rev() {
        let b = n * 5; // bit offset within the entire input
        let i = b / 8; // input byte index
        let j = b % 8; // bit offset within that input byte

        let mut c = input[i] >> j;
        if i + 1 < input.len() {
            // pull the remaining bits from the next input byte. The shift
            // needs to happen in u16, the shift amount can be 8.
            c |= ((input[i + 1] as u16) << (8 - j)) as u8;
        }

        output.push(ALPHABET[(c & 0x1f) as usize] as char);
    }

    output
}

/// Returns decoded input
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Nixbase32DecodeError> {
    let output_len = decode_len(input.len());
    if output_len == 0 && !input.is_empty() {
        // a single character encodes less than one byte
        return Err(Nixbase32DecodeError::InvalidLength);
    }
    let mut output = vec![0x00; output_len];

    // Iterate over the characters in reverse, undoing what encode() did,
    // 5 bits at a time.
    for (n, c) in input.iter().rev().enumerate() {
        let digit = INV_ALPHABET[*c as usize];
        if digit == 0xff {
            return Err(Nixbase32DecodeError::CharacterNotInAlphabet(*c));
        }

        let b = n * 5;
        let i = b / 8;
        let j = b % 8;

        let val = (digit as u16) << j;
        output[i] |= (val & 0x00ff) as u8;
        let carry = (val >> 8) as u8;

        if i + 1 < output_len {
            output[i + 1] |= carry;
        } else if carry != 0 {
            // bits that don't fit into the output indicate an invalid
            // encoding.
            return Err(Nixbase32DecodeError::NonzeroCarry);
        }
    }

    Ok(output)
}

/// Decode into a fixed-size array, failing if the encoded length doesn't
/// match up.
pub fn decode_fixed<const N: usize>(input: impl AsRef<[u8]>) -> Result<[u8; N], Nixbase32DecodeError> {
    let input = input.as_ref();
    if input.len() != encode_len(N) {
        return Err(Nixbase32DecodeError::InvalidLength);
    }
    let decoded = decode(input)?;
    Ok(decoded.try_into().expect("decode_len consistent"))
}

/// Returns the decoded length of an input of length len.
pub fn decode_len(len: usize) -> usize {
    (len * 5) / 8
}

/// Returns the encoded length of an input of length len.
pub fn encode_len(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (len * 8 - 1) / 5 + 1
}
