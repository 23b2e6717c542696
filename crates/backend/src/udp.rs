// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datagram channel backend. Fire-and-forget: each publish is one datagram
//! per configured peer, each received datagram is one delivery. No RPC.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use em_channel::{MessageWrapper, SubscribeWrapper};
use em_rpc::{RpcContext, Status, StatusCode};

use crate::framing::{self, Frame};
use crate::protocol::{Backend, BackendError, StateCell};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct UdpOptions {
    /// Bind address for receiving, e.g. `0.0.0.0:51587`. Without it the
    /// backend is send-only.
    listen: Option<String>,
    pub_topics_options: Vec<UdpTopicOption>,
}

#[derive(Debug, Clone, Deserialize)]
struct UdpTopicOption {
    topic_name: String,
    server_url_list: Vec<String>,
}

pub struct UdpBackend {
    state: StateCell,
    options: RwLock<UdpOptions>,
    subscriptions: RwLock<HashMap<String, Vec<Arc<SubscribeWrapper>>>>,
    send_socket: Mutex<Option<std::net::UdpSocket>>,
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
    cancel: CancellationToken,
}

impl UdpBackend {
    pub const NAME: &'static str = "udp";

    pub fn new() -> Self {
        Self {
            state: StateCell::new(Self::NAME),
            options: RwLock::new(UdpOptions::default()),
            subscriptions: RwLock::new(HashMap::new()),
            send_socket: Mutex::new(None),
            runtime: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    fn peer_urls(&self, topic: &str) -> Vec<String> {
        self.options
            .read()
            .pub_topics_options
            .iter()
            .find(|option| option.topic_name == topic)
            .map(|option| option.server_url_list.clone())
            .unwrap_or_default()
    }
}

impl Default for UdpBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn recv_loop(
    listen: String,
    subscriptions: Arc<HashMap<String, Vec<Arc<SubscribeWrapper>>>>,
    cancel: CancellationToken,
) {
    let socket = match tokio::net::UdpSocket::bind(&listen).await {
        Ok(socket) => socket,
        Err(err) => {
            warn!(%listen, error = %err, "udp backend failed to bind");
            return;
        }
    };

    let mut buf = vec![0u8; 65536];
    loop {
        let len = tokio::select! {
            _ = cancel.cancelled() => return,
            received = socket.recv(&mut buf) => match received {
                Ok(len) => len,
                Err(err) => {
                    warn!(error = %err, "udp receive failed");
                    continue;
                }
            },
        };

        if len < 4 {
            continue;
        }
        let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if body_len + 4 > len {
            debug!("udp datagram truncated, dropped");
            continue;
        }

        let frame = match framing::decode(&buf[4..4 + body_len]) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "undecodable udp datagram dropped");
                continue;
            }
        };

        if let Frame::Channel {
            topic,
            type_name,
            payload,
        } = frame
        {
            let Some(subs) = subscriptions.get(&topic) else {
                continue;
            };
            let topic: Arc<str> = Arc::from(topic.as_str());
            let payload: Arc<[u8]> = Arc::from(payload.get().as_bytes());
            for sub in subs {
                if sub.type_name == type_name {
                    sub.deliver(MessageWrapper {
                        topic: Arc::clone(&topic),
                        type_name: sub.type_name,
                        payload: Arc::clone(&payload),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Backend for UdpBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&self, options: serde_yaml::Mapping) -> Result<(), BackendError> {
        self.state.to_init()?;
        let parsed: UdpOptions = serde_yaml::from_value(serde_yaml::Value::Mapping(options))
            .map_err(|err| BackendError::Options {
                backend: Self::NAME,
                reason: err.to_string(),
            })?;
        *self.options.write() = parsed;
        Ok(())
    }

    fn start(&self) -> Result<(), BackendError> {
        self.state.to_start()?;

        let socket = std::net::UdpSocket::bind("0.0.0.0:0").map_err(|source| BackendError::Io {
            backend: Self::NAME,
            source,
        })?;
        *self.send_socket.lock() = Some(socket);

        let listen = self.options.read().listen.clone();
        let has_subs = !self.subscriptions.read().is_empty();
        if let (Some(listen), true) = (listen, has_subs) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("em-backend-udp")
                .enable_all()
                .build()
                .map_err(|source| BackendError::Io {
                    backend: Self::NAME,
                    source,
                })?;
            let subscriptions = Arc::new(self.subscriptions.read().clone());
            runtime.spawn(recv_loop(listen, subscriptions, self.cancel.clone()));
            *self.runtime.lock() = Some(runtime);
        }
        Ok(())
    }

    fn subscribe(&self, wrapper: Arc<SubscribeWrapper>) -> bool {
        if self.state.expect_init("subscribe").is_err() {
            return false;
        }
        self.subscriptions
            .write()
            .entry(wrapper.topic.clone())
            .or_default()
            .push(wrapper);
        true
    }

    fn publish(&self, msg: MessageWrapper) {
        if !self.state.is_started() {
            return;
        }

        let urls = self.peer_urls(msg.topic.as_ref());
        if urls.is_empty() {
            debug!(topic = %msg.topic, "udp publish dropped, no peer configured");
            return;
        }

        let payload = match framing::raw_payload(&msg.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic = %msg.topic, error = %err, "udp publish dropped");
                return;
            }
        };
        let frame = Frame::Channel {
            topic: msg.topic.to_string(),
            type_name: msg.type_name.to_owned(),
            payload,
        };
        let body = match framing::encode(&frame) {
            Ok(body) => body,
            Err(err) => {
                warn!(topic = %msg.topic, error = %err, "udp publish dropped");
                return;
            }
        };

        let mut datagram = Vec::with_capacity(body.len() + 4);
        datagram.extend_from_slice(&(body.len() as u32).to_be_bytes());
        datagram.extend_from_slice(&body);

        let socket = self.send_socket.lock();
        let Some(socket) = socket.as_ref() else {
            return;
        };
        for url in urls {
            if let Err(err) = socket.send_to(&datagram, &url) {
                debug!(topic = %msg.topic, peer = %url, error = %err, "udp send failed");
            }
        }
    }

    async fn invoke(
        &self,
        _ctx: Arc<RpcContext>,
        method: &str,
        _request: Vec<u8>,
    ) -> (Status, Vec<u8>) {
        (
            Status::with_message(
                StatusCode::Unavailable,
                format!("udp backend cannot carry rpc [{method}]"),
            ),
            Vec::new(),
        )
    }

    fn shutdown(&self) {
        if self.state.to_shutdown() {
            self.cancel.cancel();
            if let Some(runtime) = self.runtime.lock().take() {
                runtime.shutdown_background();
            }
            *self.send_socket.lock() = None;
        }
    }
}

#[cfg(test)]
#[path = "udp_tests.rs"]
mod tests;
