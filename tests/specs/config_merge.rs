// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration specs: patch tags through the full processor path.

use std::path::PathBuf;

use serial_test::serial;

use em_config::{Cfg, Processor};

fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Scenario: base has executors [A, B]; the patch deletes A and appends C;
/// the effective list is [B, C].
#[test]
#[serial(em_specs_env)]
fn delete_then_append_executors() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "executor:\n  executors:\n    - {name: A}\n    - {name: B}\n",
    );
    let patch = write(
        &dir,
        "patch.yaml",
        "executor:\n  executors:\n    - !delete {name: A}\n    - !new.back {name: C}\n",
    );

    let mut processor = Processor::new(Cfg::new());
    processor.set_user_cfg_path(Some(base));
    processor.set_user_patch_paths(vec![patch]);

    let effective = processor.effective().unwrap();
    let names: Vec<_> = effective
        .typed
        .executor
        .executors
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["B", "C"]);
}

/// Applying an idempotent patch twice equals applying it once.
#[test]
#[serial(em_specs_env)]
fn idempotent_patch_converges() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "executor:\n  executors:\n    - {name: A, type: asio_thread}\n    - {name: B}\n",
    );
    let patch = write(
        &dir,
        "patch.yaml",
        "executor:\n  executors:\n    - !override {name: A, type: simple_thread}\n    - !delete {name: B}\n    - !new.never {name: Q}\n",
    );

    let once = {
        let mut processor = Processor::new(Cfg::new());
        processor.set_user_cfg_path(Some(base.clone()));
        processor.set_user_patch_paths(vec![patch.clone()]);
        processor.effective().unwrap().typed
    };
    let twice = {
        let mut processor = Processor::new(Cfg::new());
        processor.set_user_cfg_path(Some(base));
        processor.set_user_patch_paths(vec![patch.clone(), patch]);
        processor.effective().unwrap().typed
    };

    assert_eq!(once, twice);
}

/// A misspelled mode is fatal and names the offending file.
#[test]
#[serial(em_specs_env)]
fn misspelled_mode_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "executor:\n  executors:\n    - {name: A}\n");
    let patch = write(
        &dir,
        "patch.yaml",
        "executor:\n  executors:\n    - !ovveride {name: A}\n",
    );

    let mut processor = Processor::new(Cfg::new());
    processor.set_user_cfg_path(Some(base));
    processor.set_user_patch_paths(vec![patch]);

    let err = processor.effective().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("ovveride"));
    assert!(text.contains("patch.yaml"));
}

/// Env expansion happens before parse; unknown variables become empty.
#[test]
#[serial(em_specs_env)]
fn env_vars_expand_in_user_files() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("EM_SPECS_LVL", "warn");
    let base = write(
        &dir,
        "base.yaml",
        "log:\n  core_lvl: ${EM_SPECS_LVL}\n  default_module_lvl: \"$EM_SPECS_UNSET info\"\n",
    );

    let mut processor = Processor::new(Cfg::new());
    processor.set_user_cfg_path(Some(base));
    let effective = processor.effective().unwrap();

    assert_eq!(effective.typed.log.core_lvl, "warn");
    assert_eq!(effective.typed.log.default_module_lvl, " info");

    std::env::remove_var("EM_SPECS_LVL");
}

/// The merged document dumps and re-parses identically.
#[test]
#[serial(em_specs_env)]
fn dump_and_reuse_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("effective.yaml");

    let mut cfg = Cfg::new();
    cfg.with_default_local();
    let processor = Processor::new(cfg);
    let effective = processor.dump_to(&dump).unwrap();

    // reuse the dump as the sole configuration layer
    let mut reuse = Processor::new(Cfg::new());
    reuse.set_user_cfg_path(Some(dump));
    reuse.set_ignore_predefined(true);
    let reread = reuse.effective().unwrap();

    assert_eq!(reread.typed, effective.typed);
}
