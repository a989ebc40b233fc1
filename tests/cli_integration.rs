//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the fecli binary
fn fecli_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fecli"))
}

/// Run fecli with passphrase from stdin
fn run_fecli_with_passphrase(args: &[&str], passphrase: &str) -> std::io::Result<Output> {
    let mut child = Command::new(fecli_bin())
        .arg("--passphrase-stdin")
        .args(args)
        .env_remove("FECLI_LOG")
        .env_remove("FECLI_ATOMIC")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error or a no-op outcome
        let _ = stdin.write_all(passphrase.as_bytes());
    }

    child.wait_with_output()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Decrypt known ciphertext.
#[test]
fn test_decrypt_known_ciphertext() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("hello.txt");
    fs::copy(testdata_path("hello.txt.fecli"), &target).unwrap();

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "decrypt");

    let decrypted = fs::read(&target).unwrap();
    let expected = fs::read(testdata_path("hello.txt")).unwrap();
    assert_eq!(decrypted, expected);
    assert!(String::from_utf8_lossy(&result.stdout).contains("File successfully decrypted"));
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("hello.txt");
    fs::copy(testdata_path("hello.txt"), &target).unwrap();
    let original = fs::read(&target).unwrap();

    let result = run_fecli_with_passphrase(&["encrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "encrypt");
    assert!(String::from_utf8_lossy(&result.stdout).contains("File successfully encrypted"));

    let encrypted = fs::read(&target).unwrap();
    assert_eq!(&encrypted[..5], b"FECLI");
    assert_ne!(encrypted, original);
    // No backup unless asked for one.
    assert!(!temp_dir.path().join("hello.txt.bak").exists());

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "decrypt");
    assert_eq!(fs::read(&target).unwrap(), original);
}

#[test]
fn test_trailing_newline_in_passphrase_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("hello.txt");
    fs::copy(testdata_path("hello.txt.fecli"), &target).unwrap();

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "test\n").unwrap();
    assert_success(&result, "decrypt");
    assert_eq!(
        fs::read(&target).unwrap(),
        fs::read(testdata_path("hello.txt")).unwrap()
    );
}

#[test]
fn test_encrypt_with_backup() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("notes.txt");
    fs::write(&target, "keep a copy").unwrap();

    let result =
        run_fecli_with_passphrase(&["encrypt", "--backup", path_arg(&target)], "test").unwrap();
    assert_success(&result, "encrypt");

    let backup = temp_dir.path().join("notes.txt.bak");
    assert_eq!(fs::read_to_string(&backup).unwrap(), "keep a copy");
    assert_eq!(&fs::read(&target).unwrap()[..5], b"FECLI");
}

#[test]
fn test_encrypt_already_encrypted_is_info() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("hello.txt");
    fs::copy(testdata_path("hello.txt.fecli"), &target).unwrap();
    let before = fs::read(&target).unwrap();

    let result = run_fecli_with_passphrase(&["encrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "encrypt");
    assert!(String::from_utf8_lossy(&result.stdout).contains("already encrypted"));
    assert_eq!(fs::read(&target).unwrap(), before);
}

#[test]
fn test_decrypt_plaintext_is_info() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("plain.txt");
    fs::write(&target, "just text").unwrap();

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "decrypt");
    assert!(String::from_utf8_lossy(&result.stdout).contains("not encrypted"));
    assert_eq!(fs::read_to_string(&target).unwrap(), "just text");
}

#[test]
fn test_decrypt_with_wrong_passphrase_fails() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("hello.txt");
    fs::copy(testdata_path("hello.txt.fecli"), &target).unwrap();
    let before = fs::read(&target).unwrap();

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "wrong").unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("incorrect password or corrupted file"),
        "Expected error message about password/corruption, got: {}",
        stderr
    );
    assert_eq!(fs::read(&target).unwrap(), before);
}

#[test]
fn test_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nonexistent.txt");

    for command in ["encrypt", "decrypt", "status"] {
        let result = run_fecli_with_passphrase(&[command, path_arg(&missing)], "test").unwrap();
        assert!(!result.status.success(), "{} should fail", command);
        assert!(String::from_utf8_lossy(&result.stderr).contains("File not found"));
    }
    assert!(!missing.exists());
}

#[test]
fn test_status() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("plain.txt");
    fs::write(&plain, "abc").unwrap();

    let result = run_fecli_with_passphrase(&["status", path_arg(&plain)], "").unwrap();
    assert_success(&result, "status");
    assert!(String::from_utf8_lossy(&result.stdout).trim_end().ends_with(": not encrypted"));

    let result = run_fecli_with_passphrase(
        &["status", path_arg(&testdata_path("hello.txt.fecli"))],
        "",
    )
    .unwrap();
    assert_success(&result, "status");
    assert!(String::from_utf8_lossy(&result.stdout).trim_end().ends_with(": encrypted"));
}

#[test]
fn test_empty_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("empty.txt");
    fs::write(&target, b"").unwrap();

    let result = run_fecli_with_passphrase(&["encrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "encrypt");
    assert_eq!(fs::metadata(&target).unwrap().len(), 37);

    let result = run_fecli_with_passphrase(&["decrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "decrypt");
    assert_eq!(fs::read(&target).unwrap(), b"");
}

#[test]
fn test_large_file_atomic_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("large.bin");
    let large_content = vec![0x42u8; 1024 * 1024];
    fs::write(&target, &large_content).unwrap();

    let result =
        run_fecli_with_passphrase(&["--atomic", "encrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "encrypt");
    assert_eq!(
        fs::metadata(&target).unwrap().len(),
        (21 + large_content.len() + 16) as u64
    );

    let result =
        run_fecli_with_passphrase(&["--atomic", "decrypt", path_arg(&target)], "test").unwrap();
    assert_success(&result, "decrypt");
    assert_eq!(fs::read(&target).unwrap(), large_content);
}
