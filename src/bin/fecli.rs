//! fecli CLI - Password-based in-place file encryption
//!
//! Command-line interface for encrypting and decrypting files in place using
//! AES-256-CBC with a SHA-256 derived key.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

use fecli::error::{ErrorCategory, ErrorKind, FecliError, Result};
use fecli::file_ops::{self, DecryptOutcome, EncryptOutcome, TransformOptions, WriteMode};
use fecli::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};

#[derive(Parser)]
#[command(name = "fecli")]
#[command(version)]
#[command(about = "Small tool, strong protection: encrypt and decrypt files in place.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true, env = "FECLI_PASSPHRASE_STDIN")]
    passphrase_stdin: bool,

    /// Replace the file through a tempfile and rename instead of rewriting it
    #[arg(long, global = true, env = "FECLI_ATOMIC")]
    atomic: bool,

    /// Log each step to stderr (overridden by FECLI_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lock (encrypt) a file in place
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file to encrypt
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Copy the file to FILE.bak before encrypting
        #[arg(short, long, conflicts_with = "no_backup")]
        backup: bool,

        /// Do not create a backup and do not ask about one
        #[arg(long)]
        no_backup: bool,
    },

    /// Unlock (decrypt) a file in place
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file to decrypt
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Report whether a file is encrypted
    #[command(alias = "s")]
    Status {
        /// Path to the file to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = TransformOptions::default().with_write_mode(if cli.atomic {
        WriteMode::Atomic
    } else {
        WriteMode::InPlace
    });

    let result = match cli.command {
        Commands::Encrypt {
            file,
            backup,
            no_backup,
        } => run_encrypt(&file, backup, no_backup, cli.passphrase_stdin, options),
        Commands::Decrypt { file } => run_decrypt(&file, cli.passphrase_stdin, options),
        Commands::Status { file } => run_status(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e.chain_message());
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fecli=debug" } else { "fecli=warn" };
    let filter = EnvFilter::try_from_env("FECLI_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_encrypt(
    file: &Path,
    backup: bool,
    no_backup: bool,
    passphrase_stdin: bool,
    options: TransformOptions,
) -> Result<()> {
    ensure_exists(file)?;
    if file_ops::is_encrypted(file)? {
        println!("Info: This file is already encrypted.");
        return Ok(());
    }

    let passphrase = get_passphrase_reader(passphrase_stdin).read_passphrase()?;
    let backup = if backup || no_backup {
        backup
    } else if !passphrase_stdin && io::stdin().is_terminal() {
        ask_for_backup()?
    } else {
        false
    };

    match file_ops::encrypt_file(file, &passphrase, &options.with_backup(backup))? {
        EncryptOutcome::Encrypted => {
            println!("File successfully encrypted: {}", file.display());
        }
        EncryptOutcome::AlreadyEncrypted => {
            println!("Info: This file is already encrypted.");
        }
    }
    Ok(())
}

fn run_decrypt(file: &Path, passphrase_stdin: bool, options: TransformOptions) -> Result<()> {
    ensure_exists(file)?;
    if !file_ops::is_encrypted(file)? {
        println!("Info: This file is not encrypted.");
        return Ok(());
    }

    let passphrase = get_passphrase_reader(passphrase_stdin).read_passphrase()?;

    match file_ops::decrypt_file(file, &passphrase, &options)? {
        DecryptOutcome::Decrypted => {
            println!("File successfully decrypted: {}", file.display());
        }
        DecryptOutcome::NotEncrypted => {
            println!("Info: This file is not encrypted.");
        }
    }
    Ok(())
}

fn run_status(file: &Path) -> Result<()> {
    ensure_exists(file)?;
    let state = if file_ops::is_encrypted(file)? {
        "encrypted"
    } else {
        "not encrypted"
    };
    println!("{}: {}", file.display(), state);
    Ok(())
}

fn ensure_exists(file: &Path) -> Result<()> {
    if file.is_file() {
        Ok(())
    } else {
        Err(FecliError::with_kind(
            ErrorCategory::User,
            ErrorKind::FileUnreadable,
            format!("File not found - {}", file.display()),
        ))
    }
}

fn ask_for_backup() -> Result<bool> {
    let io_error = |e: io::Error| {
        FecliError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to ask for backup: {}", e),
            e,
        )
    };

    let mut stderr = io::stderr();
    stderr
        .write_all(b"Create backup before encryption? (y/n): ")
        .map_err(io_error)?;
    stderr.flush().map_err(io_error)?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer).map_err(io_error)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
