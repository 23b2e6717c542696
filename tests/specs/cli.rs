// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI specs driving the em-demo binary.

use assert_cmd::Command;

#[test]
fn dump_only_writes_the_merged_config_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("demo.yaml");
    std::fs::write(&cfg, "log:\n  core_lvl: warn\n").unwrap();

    Command::cargo_bin("em-demo")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "--cfg_file_path",
            cfg.to_str().unwrap(),
            "--dump_only",
            "--register_signal",
            "false",
        ])
        .assert()
        .success();

    let dumped = dir.path().join("demo.yaml.dump");
    assert!(dumped.exists(), "expected {dumped:?}");

    let text = std::fs::read_to_string(&dumped).unwrap();
    let reparsed: em_config::CoreConfig = serde_yaml::from_str(&text).unwrap();
    assert_eq!(reparsed.log.core_lvl, "warn");
    // code defaults made it into the dump too
    assert!(reparsed
        .channel
        .backends
        .iter()
        .any(|b| b.backend_type == "local"));
}

#[test]
fn shutdown_after_seconds_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("em-demo")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "--shutdown_after_seconds",
            "1",
            "--register_signal",
            "false",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();
}

#[test]
fn unknown_flag_is_rejected() {
    Command::cargo_bin("em-demo")
        .unwrap()
        .arg("--definitely_not_a_flag")
        .assert()
        .failure();
}
