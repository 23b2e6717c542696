// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value-to-wire type adaptation.
//!
//! Every value type `T` published or received on a channel resolves to a wire
//! type `W` that backends can carry. Directly supported types implement
//! [`WireMessage`] and travel as themselves; arbitrary user types implement
//! [`Adapt`] with a pair of conversion functions. Conversions are treated as
//! potentially expensive and run exactly once per publish or delivery.
//!
//! Wire bodies are JSON; framing adds a 4-byte length prefix at the socket
//! edge (see `em-backend`).

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors produced on the adaptation/serialization edge. A failing publish or
/// delivery is dropped with an error log; the runtime never aborts on these.
#[derive(Debug, Error)]
pub enum AdaptError {
    #[error("failed to encode [{type_name}]: {source}")]
    Encode {
        type_name: &'static str,
        source: serde_json::Error,
    },

    #[error("failed to decode [{type_name}]: {source}")]
    Decode {
        type_name: &'static str,
        source: serde_json::Error,
    },

    #[error("conversion failed for [{type_name}]: {reason}")]
    Convert {
        type_name: &'static str,
        reason: String,
    },

    #[error("payload is not a [{expected}]")]
    TypeMismatch { expected: &'static str },
}

/// A type that backends can carry directly.
pub trait WireMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name used for registration and on the wire.
    fn type_name() -> &'static str;
}

/// Binds a value type `T` to its wire type `W` with a conversion pair.
///
/// Directly supported types get the identity adaptation through the blanket
/// impl below; user types provide their own. A missing impl is a
/// compile-time failure at the `init` call site.
pub trait Adapt: Send + Sync + Sized + 'static {
    type Wire: WireMessage;

    fn to_wire(&self) -> Result<Self::Wire, AdaptError>;

    fn from_wire(wire: &Self::Wire) -> Result<Self, AdaptError>;
}

impl<T> Adapt for T
where
    T: WireMessage + Clone,
{
    type Wire = T;

    fn to_wire(&self) -> Result<T, AdaptError> {
        Ok(self.clone())
    }

    fn from_wire(wire: &T) -> Result<T, AdaptError> {
        Ok(wire.clone())
    }
}

type ErasedValue = Box<dyn Any + Send + Sync>;

/// Serialization handle for one wire type: name, encode, decode.
///
/// This is the only contract backends need from the type system; they never
/// see `W` itself, only bytes and this handle.
#[derive(Clone)]
pub struct TypeSupport {
    type_name: &'static str,
    encode: Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, AdaptError> + Send + Sync>,
    decode: Arc<dyn Fn(&[u8]) -> Result<ErasedValue, AdaptError> + Send + Sync>,
}

impl TypeSupport {
    pub fn of<W: WireMessage>() -> Self {
        Self {
            type_name: W::type_name(),
            encode: Arc::new(|value| {
                let typed = value
                    .downcast_ref::<W>()
                    .ok_or(AdaptError::TypeMismatch {
                        expected: W::type_name(),
                    })?;
                serde_json::to_vec(typed).map_err(|source| AdaptError::Encode {
                    type_name: W::type_name(),
                    source,
                })
            }),
            decode: Arc::new(|bytes| {
                let typed: W =
                    serde_json::from_slice(bytes).map_err(|source| AdaptError::Decode {
                        type_name: W::type_name(),
                        source,
                    })?;
                Ok(Box::new(typed) as ErasedValue)
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn encode(&self, value: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, AdaptError> {
        (self.encode)(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ErasedValue, AdaptError> {
        (self.decode)(bytes)
    }

    /// Typed encode shortcut used on the publish path.
    pub fn encode_value<W: WireMessage>(&self, value: &W) -> Result<Vec<u8>, AdaptError> {
        self.encode(value)
    }
}

impl std::fmt::Debug for TypeSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeSupport")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
#[path = "adapt_tests.rs"]
mod tests;
