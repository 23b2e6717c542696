// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_document_parses_with_defaults() {
    let cfg: CoreConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.log.core_lvl, "info");
    assert!(cfg.channel.backends.is_empty());
    assert!(cfg.executor.executors.is_empty());
}

#[test]
fn full_sections_round_trip() {
    let yaml = r#"
log:
  core_lvl: warn
  backends:
    - type: console
channel:
  backends:
    - type: local
    - type: udp
      options:
        listen: 0.0.0.0:51587
  pub_topics_options:
    - topic_name: "/log/.*"
      enable_backends: [udp]
    - topic_name: "(.*)"
      enable_backends: [local]
rpc:
  backends:
    - type: local
  clients_options:
    - func_name: "(.*)"
      enable_backends: [local]
executor:
  executors:
    - name: work
      type: asio_thread
      options:
        thread_num: 4
module:
  modules:
    - name: planner
      log_lvl: debug
"#;
    let cfg: CoreConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.log.core_lvl, "warn");
    assert_eq!(cfg.channel.backends.len(), 2);
    assert_eq!(cfg.channel.pub_topics_options[0].topic_name, "/log/.*");
    assert_eq!(cfg.executor.executors[0].options.thread_num, 4);
    assert_eq!(cfg.module.modules[0].log_lvl.as_deref(), Some("debug"));

    let value = cfg.to_value().unwrap();
    let back = CoreConfig::from_value(value).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn executor_type_defaults_to_asio_thread() {
    let cfg: CoreConfig = serde_yaml::from_str(
        "executor:\n  executors:\n    - name: work\n",
    )
    .unwrap();
    assert_eq!(cfg.executor.executors[0].executor_type, "asio_thread");
    assert_eq!(cfg.executor.executors[0].options.thread_num, 1);
}
