//! Encryption/decryption using SHA-256 + AES-256-CBC
//!
//! This module implements the byte transform behind the container format:
//! - SHA-256 over the UTF-8 password, used directly as the AES-256 key
//! - AES-256 in CBC mode with PKCS#7 padding and a random 16-byte IV
//!
//! The key derivation is a single unsalted hash pass and nothing authenticates
//! the ciphertext. Both are properties of the file format; changing either
//! breaks compatibility with existing containers.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::container::{self, IV_LEN};
use crate::error::{ErrorCategory, ErrorKind, FecliError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// AES block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Symmetric key, wiped from memory on drop.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

/// Derive the AES-256 key from a password.
///
/// Identical passwords always yield identical keys.
pub fn derive_key(password: &str) -> Key {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&Sha256::digest(password.as_bytes()));
    key
}

/// Generate a fresh IV from the operating system's CSPRNG.
pub fn generate_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    OsRng.try_fill_bytes(&mut iv).map_err(|e| {
        FecliError::new(
            ErrorCategory::Internal,
            format!("failed to generate IV: {}", e),
        )
    })?;
    Ok(iv)
}

/// Encrypt plaintext with a password using a random IV
///
/// Returns the complete container: magic(5) + iv(16) + ciphertext(variable)
pub fn encrypt(password: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let iv = generate_iv()?;
    Ok(encrypt_with_iv(password, plaintext, &iv))
}

/// Encrypt plaintext with a password using the provided IV
///
/// This function is ONLY for known-answer testing. Reusing an IV with the same
/// password leaks plaintext structure; production code goes through `encrypt()`.
pub fn encrypt_with_iv(password: &str, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
    let key = derive_key(password);
    let ciphertext = Aes256CbcEnc::new((&*key).into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    container::encode(iv, &ciphertext)
}

/// Decrypt a complete container with a password
///
/// The caller is expected to have checked the magic marker already.
pub fn decrypt(password: &str, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let parsed = container::decode(bytes)?;

    // CBC needs at least one whole block, and PKCS#7 always emits one.
    if parsed.ciphertext.is_empty() || parsed.ciphertext.len() % BLOCK_LEN != 0 {
        return Err(bad_password_or_data());
    }

    let key = derive_key(password);
    let plaintext = Aes256CbcDec::new((&*key).into(), parsed.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(parsed.ciphertext)
        .map_err(|_| bad_password_or_data())?;

    Ok(Zeroizing::new(plaintext))
}

fn bad_password_or_data() -> FecliError {
    FecliError::with_kind(
        ErrorCategory::User,
        ErrorKind::IncorrectPasswordOrCorruptData,
        "incorrect password or corrupted file",
    )
}
