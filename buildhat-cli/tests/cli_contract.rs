//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("buildhat");
    for var in [
        "BUILDHAT_PORT",
        "BUILDHAT_FIRMWARE",
        "BUILDHAT_SIGNATURE",
        "BUILDHAT_RESET_PIN",
        "BUILDHAT_BOOT_PIN",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_assets(dir: &std::path::Path) {
    let data = dir.join("data");
    fs::create_dir_all(&data).expect("create data dir");
    fs::write(data.join("firmware.bin"), [1u8, 2, 3, 4]).expect("write firmware");
    fs::write(data.join("signature.bin"), [0xAAu8; 64]).expect("write signature");
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("buildhat"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("buildhat"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn start_help_lists_reset_flag() {
    let mut cmd = cli_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--reset"))
        .stdout(predicate::str::contains("--firmware-dir"));
}

#[test]
fn list_ports_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    // Hosts without a serial subsystem report the enumeration error
    if !output.status.success() {
        assert_eq!(output.status.code(), Some(1));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Failed to list serial ports"));
        return;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], serde_json::Value::Bool(true));
    assert!(parsed["data"]["ports"].is_array());
}

#[test]
fn completions_bash_writes_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("buildhat"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

/// Exit code 2: usage error (unknown command, invalid arguments)
#[test]
fn exit_code_two_on_usage_error() {
    let mut cmd = cli_cmd();
    cmd.arg("frobnicate")
        .assert()
        .failure()
        .code(2);

    let mut cmd = cli_cmd();
    cmd.args(["start", "/dev/serial0", "--timeout", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_when_no_port_anywhere() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir
        .path()
        .join("empty.toml");
    fs::write(&config, "").expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(config.as_os_str())
        .arg("start")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No serial port"));
}

#[test]
fn missing_assets_fail_before_touching_port() {
    let dir = tempdir().expect("tempdir should be created");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["start", "/dev/buildhat-missing-port"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("firmware.bin"));
}

/// Port validation failures exit with 4. A host that cannot enumerate its
/// ports at all reports that error with exit code 1 instead.
fn assert_port_rejected(output: &std::process::Output, port: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("Cannot use serial port {port}")),
        "stderr: {stderr}"
    );
    match output.status.code() {
        Some(4) => assert!(
            stderr.contains("Port not found") || stderr.contains("No serial ports found"),
            "stderr: {stderr}"
        ),
        Some(1) => {},
        other => panic!("unexpected exit code {other:?}, stderr: {stderr}"),
    }
}

/// Exit code 4: the requested port does not exist
#[test]
fn exit_code_four_on_unknown_port() {
    let dir = tempdir().expect("tempdir should be created");
    write_assets(dir.path());

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .args(["start", "/dev/buildhat-missing-port"])
        .output()
        .expect("command should execute");

    assert_port_rejected(&output, "/dev/buildhat-missing-port");
}

/// Exit code 3: RESET and BOOT on the same line
#[test]
fn exit_code_three_on_shared_pins() {
    let mut cmd = cli_cmd();
    cmd.args(["reset", "--reset-pin", "5", "--boot-pin", "5"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("GPIO5"));
}

#[test]
fn env_port_is_used_by_start() {
    let dir = tempdir().expect("tempdir should be created");
    write_assets(dir.path());

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .env("BUILDHAT_PORT", "/dev/buildhat-env-port")
        .arg("start")
        .output()
        .expect("command should execute");

    assert_port_rejected(&output, "/dev/buildhat-env-port");
}
