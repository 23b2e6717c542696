// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for the enum name tables used across the runtime:
//! backend states, lifecycle stages, executor kinds, status codes.
//!
//! - [`simple_display!`] — `Display` from a variant → literal table
//! - [`parse_from_str!`] — `FromStr` inverting the same table

/// Generate a `Display` impl from a variant → string-literal table.
///
/// Data-carrying variants take `(..)` to discard their fields; the rendered
/// name comes from the table, never from the payload. Config-facing enums
/// usually pair this with [`parse_from_str!`] over the same table.
///
/// ```ignore
/// em_core::simple_display! {
///     BackendState {
///         PreInit => "pre_init",
///         Failed(..) => "failed",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let name = match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                };
                f.write_str(name)
            }
        }
    };
}

/// Generate a `FromStr` impl from the same variant table used for Display.
///
/// Only unit variants are supported; anything else needs a hand-written parser.
///
/// ```ignore
/// em_core::parse_from_str! {
///     MyEnum, "my enum" {
///         Foo => "foo",
///         Bar => "bar",
///     }
/// }
/// ```
#[macro_export]
macro_rules! parse_from_str {
    ($enum:ty, $what:literal { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl std::str::FromStr for $enum {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err(format!("unknown {} [{}]", $what, other)),
                }
            }
        }
    };
}
