// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-rpc: request/response dispatch.
//!
//! Method names carry a serialization prefix (`pb:`, `ros2:`); the registry
//! indexes the single server handler per method and routes client calls to
//! backends by first-matching rule, like the channel side.

mod context;
mod filter;
mod registry;
mod status;

pub use context::RpcContext;
pub use filter::{RpcFilter, RpcFilterChain, RpcFilterRegistry};
pub use registry::{
    ClientFuncWrapper, ErasedHandler, RpcDeliveryMode, RpcError, RpcRegistry,
    RpcRegistryBuilder, ServiceFuncWrapper,
};
pub use status::{Status, StatusCode};

// the method-name format lives in em-core; re-exported for rpc call sites
pub use em_core::{MethodName, MethodNameError};
