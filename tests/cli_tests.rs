//! Binary-level checks of the argument surface and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_cli_surface() {
    Command::cargo_bin("vidscribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--audio-language"))
        .stdout(predicate::str::contains("--summary-language"));
}

#[test]
fn missing_input_argument_is_a_usage_error() {
    Command::cargo_bin("vidscribe")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn nonexistent_input_exits_with_the_not_found_code() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("vidscribe")
        .unwrap()
        .current_dir(dir.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--input", "no-such-file.mp4", "--quiet"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn unsupported_extension_exits_with_the_format_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.xyz");
    fs_err::write(&input, b"not media").unwrap();

    Command::cargo_bin("vidscribe")
        .unwrap()
        .current_dir(dir.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--input", "notes.xyz", "--quiet"])
        .assert()
        .failure()
        .code(4);

    assert!(
        !dir.path().join("notes.txt").exists(),
        "a failed run must not create an output file"
    );
}
