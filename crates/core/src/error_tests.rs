// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn location_displays_file_and_line() {
    let loc = Location::new("src/module.rs", 42);
    assert_eq!(loc.to_string(), "src/module.rs:42");
}

#[test]
fn location_macro_captures_this_file() {
    let loc = crate::location!();
    assert!(loc.file().ends_with("error_tests.rs"));
    assert!(loc.line() > 0);
}

#[test]
fn context_mismatch_message_names_both_contexts() {
    let err = MisuseError::ContextMismatch {
        name: "/pose".into(),
        ours: 1,
        theirs: 7,
        loc: Location::new("f.rs", 1),
    };
    let msg = err.to_string();
    assert!(msg.contains("/pose"));
    assert!(msg.contains("[1]"));
    assert!(msg.contains("[7]"));
}
