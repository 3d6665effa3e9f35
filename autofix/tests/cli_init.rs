//! CLI tests for `autofix init` and `autofix key`.
//!
//! Spawns the binary and checks exit codes and written files.

use std::fs;
use std::process::Command;

use autofix::exit_codes;
use autofix::io::config::{AutofixConfig, DEFAULT_CONFIG_PATH, load_config};

#[test]
fn init_writes_default_config() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = Command::new(env!("CARGO_BIN_EXE_autofix"))
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("autofix init");

    assert_eq!(status.code(), Some(exit_codes::OK));
    let cfg = load_config(&temp.path().join(DEFAULT_CONFIG_PATH)).expect("load");
    assert_eq!(cfg, AutofixConfig::default());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(DEFAULT_CONFIG_PATH);
    fs::write(&path, "test_command = \"make test\"\n").expect("write");

    let status = Command::new(env!("CARGO_BIN_EXE_autofix"))
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("autofix init");
    assert_eq!(status.code(), Some(exit_codes::ERROR));
    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "test_command = \"make test\"\n"
    );

    let status = Command::new(env!("CARGO_BIN_EXE_autofix"))
        .current_dir(temp.path())
        .args(["init", "--force"])
        .status()
        .expect("autofix init --force");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load"), AutofixConfig::default());
}

#[test]
fn key_prints_fingerprint() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("conversation.json");
    fs::write(
        &path,
        r#"[{"role":"system","content":"You are a software engineer debugging"},{"role":"assistant","content":"ok"}]"#,
    )
    .expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_autofix"))
        .arg("key")
        .arg(&path)
        .output()
        .expect("autofix key");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "[s]you-are-a-so|er-debugging[a]ok|ok"
    );
}
