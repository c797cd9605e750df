use std::process::Command;

fn cts602() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cts602"))
}

/// Basic smoke tests for CLI functionality
#[test]
fn test_cli_help() {
    let output = cts602()
        .arg("--help")
        .output()
        .expect("Failed to execute cts602 binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: cts602"));
    assert!(stdout.contains("registers"));
}

#[test]
fn test_cli_list_ports() {
    let output = cts602()
        .arg("ports")
        .output()
        .expect("Failed to execute cts602 binary");

    assert!(output.status.success());
}

#[test]
fn test_cli_registers_json() {
    let output = cts602()
        .args(["registers", "--json"])
        .output()
        .expect("Failed to execute cts602 binary");

    assert!(output.status.success());
    let rows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("registers --json is not JSON");
    let rows = rows.as_array().expect("expected a JSON array");
    assert_eq!(rows.len(), 110);
    assert!(rows
        .iter()
        .any(|row| row["class"] == "input" && row["address"] == 211));
}

#[test]
fn test_cli_rejects_out_of_range_slave() {
    let output = cts602()
        .args(["--slave", "0", "registers"])
        .output()
        .expect("Failed to execute cts602 binary");

    assert!(!output.status.success());
}

#[test]
fn test_cli_read_on_missing_port_fails() {
    let output = cts602()
        .args(["--port", "/nonexistent/cts602-tty", "read", "input", "211", "2"])
        .output()
        .expect("Failed to execute cts602 binary");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}
