use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

pub fn flagkit_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_flagkit"));
    cmd.current_dir(workspace_root());
    cmd
}

fn describe(args: &[&str], out: &Output) -> String {
    format!(
        "flagkit {}\nexit: {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        out.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

/// Run flagkit, assert exit code, return parsed JSON stdout.
pub fn flagkit_json(args: &[&str], expected_exit: i32) -> Value {
    let out = flagkit_bin().args(args).output().expect("failed to run flagkit");
    assert_eq!(
        out.status.code().unwrap_or(-1),
        expected_exit,
        "exit mismatch for: {}",
        describe(args, &out)
    );
    serde_json::from_slice(&out.stdout)
        .unwrap_or_else(|e| panic!("invalid JSON ({e}) from: {}", describe(args, &out)))
}

/// Run flagkit, return stdout as string (exit 0 expected).
pub fn flagkit_stdout(args: &[&str]) -> String {
    let out = flagkit_bin().args(args).output().expect("failed to run flagkit");
    assert!(out.status.success(), "{}", describe(args, &out));
    String::from_utf8_lossy(&out.stdout).to_string()
}

/// Run flagkit, expect failure, return stderr.
pub fn flagkit_fails(args: &[&str]) -> String {
    let out = flagkit_bin().args(args).output().expect("failed to run flagkit");
    assert!(!out.status.success(), "expected failure: {}", describe(args, &out));
    String::from_utf8_lossy(&out.stderr).to_string()
}
