use std::process::{Command, Output};
use tempdir::TempDir;

fn tftp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tftp"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

fn tftpd(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tftpd"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

#[test]
fn test_failed_transfer_still_exits_zero() {
    let tmpdir = TempDir::new("client").unwrap();
    let missing = tmpdir.path().join("missing.bin");

    let output = tftp(&["127.0.0.1", "9", "-c", "put", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Status: failure"));
}

#[test]
fn test_unknown_operation_exits_one() {
    let output = tftp(&["127.0.0.1", "9", "-c", "fetch", "a.txt"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_bad_arguments_exit_one() {
    assert_eq!(tftp(&["127.0.0.1"]).status.code(), Some(1));
    assert_eq!(tftp(&["localhost", "69"]).status.code(), Some(1));
    assert_eq!(tftpd(&["127.0.0.1", "not-a-port"]).status.code(), Some(1));
}

#[test]
fn test_help_exits_zero() {
    let output = tftp(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("-c"));
}

#[test]
fn test_server_root_must_be_a_directory() {
    let tmpdir = TempDir::new("server").unwrap();
    let file = tmpdir.path().join("plain.txt");
    std::fs::write(&file, b"not a directory").unwrap();

    let output = tftpd(&["127.0.0.1", "0", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}
