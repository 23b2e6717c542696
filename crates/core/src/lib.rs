// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-core: resource descriptors, type adaptation, and system facilities
//! shared by every crate of the em runtime.

pub mod macros;

pub mod adapt;
pub mod clock;
pub mod container;
pub mod error;
pub mod method;
pub mod res;
pub mod sys;

pub use adapt::{Adapt, AdaptError, TypeSupport, WireMessage};
pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{IndexedVariant2, IndexedVariant3};
pub use error::{Location, MisuseError};
pub use method::{MethodName, MethodNameError, SerKind};
pub use res::{Binding, Channel, ExecutorOptions, ExecutorRes, Service};
