//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("outagewatch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("power outages"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("outagewatch")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("outagewatch"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("outagewatch")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success();
}

#[test]
fn test_status_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("outagewatch.toml");
    let db = dir.path().join("events.db");
    std::fs::write(
        &cfg,
        format!("[storage]\ndb_path = \"{}\"\n", db.display()),
    )
    .unwrap();

    Command::cargo_bin("outagewatch")
        .unwrap()
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("TELEGRAM_CHAT_ID")
        .args(["--config", cfg.to_str().unwrap(), "status", "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"NONE\""))
        .stdout(predicates::str::contains("No recent events"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("outagewatch.toml");
    std::fs::write(&cfg, "[analysis]\nwindow_secs = 0\n").unwrap();

    Command::cargo_bin("outagewatch")
        .unwrap()
        .args(["--config", cfg.to_str().unwrap(), "config"])
        .assert()
        .failure();
}

#[test]
fn test_broken_config_env_falls_back_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    Command::cargo_bin("outagewatch")
        .unwrap()
        .env("OUTAGEWATCH_CONFIG", &missing)
        .env_remove("RUST_LOG")
        .arg("config")
        .assert()
        .success()
        .stdout(predicates::str::contains("window_secs = 300"))
        .stderr(predicates::str::contains("OUTAGEWATCH_CONFIG set but file could not be loaded"));
}
