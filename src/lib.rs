//! fecli - Password-based in-place file encryption using AES-256-CBC
//!
//! Files are rewritten in place between plaintext and a container made of a
//! 5-byte magic marker, a random 16-byte IV and the CBC ciphertext. The key is
//! the SHA-256 hash of the password.
//!
//! Known weaknesses of the format, kept for compatibility with existing
//! containers:
//! - the key derivation is a single unsalted hash pass, so it offers no
//!   resistance to brute force and equal passwords give equal keys;
//! - nothing authenticates the ciphertext, so a wrong password is only
//!   detected through PKCS#7 padding validation, which occasionally passes.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod container;
pub mod error;
pub mod file_ops;
pub mod passphrase;

pub use error::{ErrorCategory, ErrorKind, FecliError, Result};
pub use file_ops::{
    DecryptOutcome, EncryptOutcome, TransformOptions, WriteMode, backup_path, decrypt_file,
    encrypt_file, is_encrypted,
};
