//! In-place file encryption/decryption
//!
//! This module drives the read-transform-write protocol over a single path:
//! the whole file is read and its handle released, the new content is built
//! in memory, and only then is the path opened for writing.
//!
//! Nothing here locks the file. Running two operations against the same path
//! at once, from one process or several, is the caller's problem.

use crate::cipher;
use crate::container::{self, MAGIC_LEN};
use crate::error::{ErrorCategory, ErrorKind, FecliError, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Suffix appended to the full file name of a backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

/// How the transformed content replaces the original file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate the file and write the new content into it.
    ///
    /// A crash mid-write can leave the file truncated. When encrypting with a
    /// backup the `.bak` copy survives; decryption has no such safety net.
    #[default]
    InPlace,
    /// Write to a temporary file in the same directory, fsync it and rename it
    /// over the original, so that either the old or the new content survives.
    Atomic,
}

/// Options shared by [`encrypt_file`] and [`decrypt_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Copy the plaintext to `<path>.bak` before encrypting. Ignored by decryption.
    pub backup: bool,
    pub write_mode: WriteMode,
}

impl TransformOptions {
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}

/// Result of a successful call to [`encrypt_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EncryptOutcome {
    /// The file now holds a container.
    Encrypted,
    /// The file already started with the magic marker and was left untouched.
    AlreadyEncrypted,
}

/// Result of a successful call to [`decrypt_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DecryptOutcome {
    /// The file now holds the recovered plaintext.
    Decrypted,
    /// The file did not start with the magic marker and was left untouched.
    NotEncrypted,
}

/// Path of the backup copy made for `path`: the same path with `.bak` appended.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Check whether the file at `path` carries the container magic marker
///
/// Only the first few bytes are read. Files shorter than the marker are
/// reported as not encrypted.
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let mut header = Vec::with_capacity(MAGIC_LEN);
    file.take(MAGIC_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| read_error(path, e))?;
    Ok(container::is_container(&header))
}

/// Encrypt a file in place with a password
///
/// Reads the plaintext at `path`, encrypts it and overwrites `path` with the
/// container. A file that is already a container is left alone and reported
/// as [`EncryptOutcome::AlreadyEncrypted`].
///
/// With `options.backup` set, the plaintext is first copied to
/// `<path>.bak`. If that copy fails nothing is written to `path`.
pub fn encrypt_file(
    path: &Path,
    password: &str,
    options: &TransformOptions,
) -> Result<EncryptOutcome> {
    let plaintext = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
    debug!(path = %path.display(), bytes = plaintext.len(), "read file for encryption");

    if container::is_container(&plaintext) {
        debug!(path = %path.display(), "magic marker present, skipping encryption");
        return Ok(EncryptOutcome::AlreadyEncrypted);
    }

    let output =
        cipher::encrypt(password, &plaintext).map_err(|e| e.with_context("encryption failed"))?;

    if options.backup {
        let backup = backup_path(path);
        make_backup(path, &backup)?;
        debug!(backup = %backup.display(), "backup written");
    }

    write_output(path, &output, options.write_mode)?;
    debug!(path = %path.display(), bytes = output.len(), "container written");
    Ok(EncryptOutcome::Encrypted)
}

/// Decrypt a file in place with a password
///
/// Reads the container at `path`, decrypts it and overwrites `path` with the
/// plaintext. A file without the magic marker is left alone and reported as
/// [`DecryptOutcome::NotEncrypted`].
pub fn decrypt_file(
    path: &Path,
    password: &str,
    options: &TransformOptions,
) -> Result<DecryptOutcome> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "read file for decryption");

    if !container::is_container(&bytes) {
        debug!(path = %path.display(), "magic marker absent, skipping decryption");
        return Ok(DecryptOutcome::NotEncrypted);
    }

    let plaintext =
        cipher::decrypt(password, &bytes).map_err(|e| e.with_context("failed to decrypt"))?;

    write_output(path, &plaintext, options.write_mode)?;
    debug!(path = %path.display(), bytes = plaintext.len(), "plaintext written");
    Ok(DecryptOutcome::Decrypted)
}

fn make_backup(path: &Path, backup: &Path) -> Result<()> {
    fs::copy(path, backup).map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::BackupFailed,
            format!(
                "failed to back up {} to {}; file left unencrypted",
                path.display(),
                backup.display()
            ),
            e,
        )
    })?;
    Ok(())
}

fn write_output(path: &Path, contents: &[u8], mode: WriteMode) -> Result<()> {
    let result = match mode {
        WriteMode::InPlace => write_in_place(path, contents),
        WriteMode::Atomic => write_atomic(path, contents),
    };
    result.map_err(|e| e.with_context(format!("failed to write to {}", path.display())))
}

/// Truncate and rewrite `path`, keeping its inode and permissions.
fn write_in_place(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::FileUnwritable,
            format!("failed to open {}", path.display()),
            e,
        )
    })?;

    file.write_all(contents).map_err(|e| write_error(path, e))?;
    file.flush().map_err(|e| write_error(path, e))?;
    Ok(())
}

/// Replace `path` via tempfile + fsync + rename.
///
/// The tempfile is created next to the target so the rename stays on one
/// filesystem. The original file's permissions are carried over.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)
        .map_err(|e| read_error(path, e))?
        .permissions();

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::FileUnwritable,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::FileUnwritable,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::FileUnwritable,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::FileUnwritable,
            "failed to sync file prior to rename",
            e,
        )
    })?;
    temp_file
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| {
            FecliError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::FileUnwritable,
                "failed to set tempfile permissions",
                e,
            )
        })?;

    temp_file.persist(path).map_err(|e| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::FileUnwritable,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> FecliError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    FecliError::with_kind_and_source(
        category,
        ErrorKind::FileUnreadable,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn write_error(path: &Path, err: io::Error) -> FecliError {
    FecliError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::FileUnwritable,
        format!("failed to write {}", path.display()),
        err,
    )
}
