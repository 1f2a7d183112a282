//! Hex chunk codec.
//!
//! One `WriteChunk` command carries a slice of the firmware image as ASCII
//! hex digit pairs. Decoding is pure: digits are case-insensitive, the
//! length must be even, and anything outside `[0-9a-fA-F]` is rejected
//! before a single byte is produced.

use core::fmt;

/// Why a hex chunk was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// Odd number of digits.
    OddLength,
    /// Non-hex character at `index`.
    InvalidDigit { index: usize, byte: u8 },
    /// Decoded chunk does not fit the output buffer.
    TooLong { needed: usize, capacity: usize },
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddLength => write!(f, "odd number of hex digits"),
            Self::InvalidDigit { index, byte } => {
                write!(f, "invalid hex digit 0x{:02x} at {}", byte, index)
            }
            Self::TooLong { needed, capacity } => {
                write!(f, "chunk decodes to {} bytes, buffer holds {}", needed, capacity)
            }
        }
    }
}

fn from_hex_error(hex: &[u8], e: hex::FromHexError) -> HexError {
    match e {
        hex::FromHexError::InvalidHexCharacter { index, .. } => HexError::InvalidDigit {
            index,
            byte: hex[index],
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            HexError::OddLength
        }
    }
}

/// Decode `hex` into the front of `out`, returning the decoded slice.
///
/// `out` is left untouched on error.
pub fn decode_into<'a>(hex: &[u8], out: &'a mut [u8]) -> Result<&'a [u8], HexError> {
    if hex.len() % 2 != 0 {
        return Err(HexError::OddLength);
    }
    let needed = hex.len() / 2;
    if needed > out.len() {
        return Err(HexError::TooLong {
            needed,
            capacity: out.len(),
        });
    }
    // Validate first so a bad digit late in the line leaves `out` untouched.
    if let Some(index) = hex.iter().position(|b| !b.is_ascii_hexdigit()) {
        return Err(HexError::InvalidDigit {
            index,
            byte: hex[index],
        });
    }
    let dst = &mut out[..needed];
    hex::decode_to_slice(hex, dst).map_err(|e| from_hex_error(hex, e))?;
    Ok(dst)
}

/// Decode `hex` into a freshly allocated buffer.
pub fn decode(hex: impl AsRef<[u8]>) -> Result<Vec<u8>, HexError> {
    let hex = hex.as_ref();
    if let Some(index) = hex.iter().position(|b| !b.is_ascii_hexdigit()) {
        return Err(HexError::InvalidDigit {
            index,
            byte: hex[index],
        });
    }
    hex::decode(hex).map_err(|e| from_hex_error(hex, e))
}

/// Canonical (upper-case) encoding, as uploaders emit it.
pub fn encode(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}
