// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn default_is_ok() {
    assert!(Status::ok().is_ok());
    assert_eq!(Status::default().code(), StatusCode::Ok);
}

#[parameterized(
    timeout = { StatusCode::Timeout, "TIMEOUT" },
    cancelled = { StatusCode::Cancelled, "CANCELLED" },
    invalid = { StatusCode::InvalidArg, "INVALID_ARG" },
)]
fn codes_display(code: StatusCode, expected: &str) {
    assert_eq!(Status::new(code).to_string(), expected);
}

#[test]
fn backend_code_and_message_render() {
    let status = Status::with_backend_code(StatusCode::Internal, 42);
    assert_eq!(status.to_string(), "INTERNAL (backend=42)");
    assert_eq!(status.backend_code(), 42);

    let status = Status::with_message(StatusCode::Unavailable, "backend not started");
    assert_eq!(status.to_string(), "UNAVAILABLE: backend not started");
}

#[test]
fn status_round_trips_through_json() {
    let status = Status::with_message(StatusCode::Timeout, "deadline exceeded");
    let bytes = serde_json::to_vec(&status).unwrap();
    let back: Status = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(back, status);
}
