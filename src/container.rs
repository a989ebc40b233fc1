//! On-disk container layout
//!
//! An encrypted file is a flat byte sequence:
//! - magic: 5 bytes, ASCII `FECLI`
//! - iv: 16 bytes
//! - ciphertext: remaining bytes, PKCS#7 padded, a multiple of 16
//!
//! There is no length field, no version byte and no MAC.

use crate::error::{ErrorCategory, ErrorKind, FecliError, Result};

/// Magic marker identifying a container.
pub const MAGIC: &[u8; MAGIC_LEN] = b"FECLI";

/// Length of the magic marker in bytes.
pub const MAGIC_LEN: usize = 5;

/// Length of the CBC initialization vector in bytes.
pub const IV_LEN: usize = 16;

/// Smallest buffer `decode` accepts: magic plus IV, with an empty ciphertext.
pub const HEADER_LEN: usize = MAGIC_LEN + IV_LEN;

/// Borrowed view over the parts of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container<'a> {
    pub iv: &'a [u8; IV_LEN],
    pub ciphertext: &'a [u8],
}

/// Returns true if `bytes` starts with the magic marker.
///
/// Inputs shorter than the marker are never containers.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC_LEN && &bytes[..MAGIC_LEN] == MAGIC
}

/// Concatenates magic, IV and ciphertext.
pub fn encode(iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(iv);
    output.extend_from_slice(ciphertext);
    output
}

/// Splits a container into its IV and ciphertext.
///
/// The magic is not re-checked here; callers are expected to have gated on
/// [`is_container`] already.
pub fn decode(bytes: &[u8]) -> Result<Container<'_>> {
    if bytes.len() < HEADER_LEN {
        return Err(FecliError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedContainer,
            format!(
                "container truncated: {} bytes, need at least {} for magic and IV",
                bytes.len(),
                HEADER_LEN
            ),
        ));
    }

    let iv: &[u8; IV_LEN] = bytes[MAGIC_LEN..HEADER_LEN].try_into().map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::MalformedContainer,
            "failed to read IV",
            e,
        )
    })?;

    Ok(Container {
        iv,
        ciphertext: &bytes[HEADER_LEN..],
    })
}
