// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream backend carrying channel frames and RPC request/response pairs.
//!
//! Outgoing publishes share one pooled connection per peer; each RPC call
//! opens its own stream, so the first response frame on it is the reply.
//! Incoming connections are served sequentially per stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use em_channel::{MessageWrapper, SubscribeWrapper};
use em_rpc::{RpcContext, RpcRegistry, ServiceFuncWrapper, Status, StatusCode};

use crate::framing::{self, Frame};
use crate::protocol::{Backend, BackendError, StateCell};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct TcpOptions {
    /// Bind address for the server side; without it the backend only dials.
    listen: Option<String>,
    pub_topics_options: Vec<TcpTopicOption>,
    clients_options: Vec<TcpClientOption>,
}

#[derive(Debug, Clone, Deserialize)]
struct TcpTopicOption {
    topic_name: String,
    server_url_list: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TcpClientOption {
    func_name: String,
    server_url: String,
}

#[derive(Default)]
struct Tables {
    subscriptions: HashMap<String, Vec<Arc<SubscribeWrapper>>>,
    services: HashMap<String, Arc<ServiceFuncWrapper>>,
}

pub struct TcpBackend {
    state: StateCell,
    options: RwLock<TcpOptions>,
    tables: Arc<RwLock<Tables>>,
    rpc_registry: RwLock<Option<Arc<RpcRegistry>>>,
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
    handle: RwLock<Option<tokio::runtime::Handle>>,
    publish_conns: Mutex<HashMap<String, mpsc::UnboundedSender<Frame>>>,
    next_call_id: AtomicU64,
    cancel: CancellationToken,
}

impl TcpBackend {
    pub const NAME: &'static str = "tcp";

    pub fn new() -> Self {
        Self {
            state: StateCell::new(Self::NAME),
            options: RwLock::new(TcpOptions::default()),
            tables: Arc::new(RwLock::new(Tables::default())),
            rpc_registry: RwLock::new(None),
            runtime: Mutex::new(None),
            handle: RwLock::new(None),
            publish_conns: Mutex::new(HashMap::new()),
            next_call_id: AtomicU64::new(1),
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

    fn client_url(&self, method: &str) -> Option<String> {
        self.options
            .read()
            .clients_options
            .iter()
            .find(|option| option.func_name == method)
            .map(|option| option.server_url.clone())
    }

    /// A pooled, lazily dialed writer to one peer.
    fn publish_sender(&self, url: &str) -> Option<mpsc::UnboundedSender<Frame>> {
        let handle = self.handle.read().clone()?;
        let mut conns = self.publish_conns.lock();

        if let Some(sender) = conns.get(url) {
            if !sender.is_closed() {
                return Some(sender.clone());
            }
            conns.remove(url);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let peer = url.to_owned();
        let cancel = self.cancel.clone();
        handle.spawn(async move {
            let mut stream = match TcpStream::connect(&peer).await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(%peer, error = %err, "tcp publish connect failed");
                    return;
                }
            };
            loop {
                let frame = tokio::select! {
                    _ = cancel.cancelled() => return,
                    frame = rx.recv() => match frame {
                        Some(frame) => frame,
                        None => return,
                    },
                };
                if let Err(err) = framing::write_frame(&mut stream, &frame).await {
                    debug!(%peer, error = %err, "tcp publish write failed");
                    return;
                }
            }
        });

        conns.insert(url.to_owned(), tx.clone());
        Some(tx)
    }
}

impl Default for TcpBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver_channel_frame(tables: &RwLock<Tables>, topic: &str, type_name: &str, payload: &[u8]) {
    let tables = tables.read();
    let Some(subs) = tables.subscriptions.get(topic) else {
        return;
    };
    let topic: Arc<str> = Arc::from(topic);
    let payload: Arc<[u8]> = Arc::from(payload);
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

async fn serve_connection(
    mut stream: TcpStream,
    tables: Arc<RwLock<Tables>>,
    registry: Option<Arc<RpcRegistry>>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = framing::read_frame(&mut stream) => match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(err) => {
                    debug!(error = %err, "tcp read failed, closing connection");
                    return;
                }
            },
        };

        match frame {
            Frame::Channel {
                topic,
                type_name,
                payload,
            } => {
                deliver_channel_frame(&tables, &topic, &type_name, payload.get().as_bytes());
            }
            Frame::Request {
                id,
                method,
                timeout_ms,
                payload,
            } => {
                let service = {
                    let tables = tables.read();
                    tables.services.get(&method).cloned()
                }
                .or_else(|| {
                    registry
                        .as_ref()
                        .and_then(|r| r.service(&method).cloned())
                });

                let (status, reply) = match service {
                    Some(service) => {
                        let mut ctx = RpcContext::new();
                        if let Some(ms) = timeout_ms {
                            ctx.set_timeout(std::time::Duration::from_millis(ms));
                        }
                        service
                            .invoke(Arc::new(ctx), payload.get().as_bytes().to_vec())
                            .await
                    }
                    None => (
                        Status::with_message(
                            StatusCode::Unavailable,
                            format!("no handler for [{method}]"),
                        ),
                        Vec::new(),
                    ),
                };

                let payload = match framing::raw_payload(if reply.is_empty() {
                    b"null"
                } else {
                    &reply
                }) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "tcp reply dropped");
                        continue;
                    }
                };
                let response = Frame::Response {
                    id,
                    status,
                    payload,
                };
                if let Err(err) = framing::write_frame(&mut stream, &response).await {
                    debug!(error = %err, "tcp response write failed");
                    return;
                }
            }
            Frame::Response { .. } => {
                debug!("unexpected response frame on server stream, dropped");
            }
        }
    }
}

#[async_trait]
impl Backend for TcpBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&self, options: serde_yaml::Mapping) -> Result<(), BackendError> {
        self.state.to_init()?;
        let parsed: TcpOptions = serde_yaml::from_value(serde_yaml::Value::Mapping(options))
            .map_err(|err| BackendError::Options {
                backend: Self::NAME,
                reason: err.to_string(),
            })?;
        *self.options.write() = parsed;
        Ok(())
    }

    fn set_rpc_registry(&self, registry: Arc<RpcRegistry>) {
        *self.rpc_registry.write() = Some(registry);
    }

    fn start(&self) -> Result<(), BackendError> {
        self.state.to_start()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("em-backend-tcp")
            .enable_all()
            .build()
            .map_err(|source| BackendError::Io {
                backend: Self::NAME,
                source,
            })?;
        *self.handle.write() = Some(runtime.handle().clone());

        if let Some(listen) = self.options.read().listen.clone() {
            let tables = Arc::clone(&self.tables);
            let registry = self.rpc_registry.read().clone();
            let cancel = self.cancel.clone();
            runtime.spawn(async move {
                let listener = match TcpListener::bind(&listen).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        warn!(%listen, error = %err, "tcp backend failed to bind");
                        return;
                    }
                };
                loop {
                    let accepted = tokio::select! {
                        _ = cancel.cancelled() => return,
                        accepted = listener.accept() => accepted,
                    };
                    match accepted {
                        Ok((stream, _peer)) => {
                            tokio::spawn(serve_connection(
                                stream,
                                Arc::clone(&tables),
                                registry.clone(),
                                cancel.clone(),
                            ));
                        }
                        Err(err) => {
                            warn!(error = %err, "tcp accept failed");
                        }
                    }
                }
            });
        }

        *self.runtime.lock() = Some(runtime);
        Ok(())
    }

    fn subscribe(&self, wrapper: Arc<SubscribeWrapper>) -> bool {
        if self.state.expect_init("subscribe").is_err() {
            return false;
        }
        self.tables
            .write()
            .subscriptions
            .entry(wrapper.topic.clone())
            .or_default()
            .push(wrapper);
        true
    }

    fn register_service_func(&self, wrapper: Arc<ServiceFuncWrapper>) -> bool {
        if self.state.expect_init("register_service_func").is_err() {
            return false;
        }
        self.tables
            .write()
            .services
            .insert(wrapper.method.full(), wrapper);
        true
    }

    fn publish(&self, msg: MessageWrapper) {
        if !self.state.is_started() {
            return;
        }

        let urls = self.peer_urls(msg.topic.as_ref());
        if urls.is_empty() {
            debug!(topic = %msg.topic, "tcp publish dropped, no peer configured");
            return;
        }

        for url in urls {
            let payload = match framing::raw_payload(&msg.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(topic = %msg.topic, error = %err, "tcp publish dropped");
                    return;
                }
            };
            let frame = Frame::Channel {
                topic: msg.topic.to_string(),
                type_name: msg.type_name.to_owned(),
                payload,
            };
            if let Some(sender) = self.publish_sender(&url) {
                if sender.send(frame).is_err() {
                    debug!(peer = %url, topic = %msg.topic, "tcp publish dropped, writer gone");
                }
            }
        }
    }

    async fn invoke(
        &self,
        ctx: Arc<RpcContext>,
        method: &str,
        request: Vec<u8>,
    ) -> (Status, Vec<u8>) {
        if !self.state.is_started() {
            return (
                Status::with_message(StatusCode::Unavailable, "tcp backend not started"),
                Vec::new(),
            );
        }
        let Some(url) = self.client_url(method) else {
            return (
                Status::with_message(
                    StatusCode::Unavailable,
                    format!("no server_url configured for [{method}]"),
                ),
                Vec::new(),
            );
        };

        let payload = match framing::raw_payload(if request.is_empty() {
            b"null"
        } else {
            &request
        }) {
            Ok(payload) => payload,
            Err(err) => {
                return (
                    Status::with_message(StatusCode::InvalidArg, err.to_string()),
                    Vec::new(),
                )
            }
        };
        let timeout_ms = ctx
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(std::time::Instant::now()))
            .map(|remaining| remaining.as_millis() as u64);
        let frame = Frame::Request {
            id: self.next_call_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_owned(),
            timeout_ms,
            payload,
        };

        let mut stream = match TcpStream::connect(&url).await {
            Ok(stream) => stream,
            Err(err) => {
                return (
                    Status::with_message(StatusCode::Unavailable, err.to_string()),
                    Vec::new(),
                )
            }
        };
        if let Err(err) = framing::write_frame(&mut stream, &frame).await {
            return (
                Status::with_message(StatusCode::Internal, err.to_string()),
                Vec::new(),
            );
        }

        loop {
            match framing::read_frame(&mut stream).await {
                Ok(Some(Frame::Response {
                    status, payload, ..
                })) => {
                    return (status, payload.get().as_bytes().to_vec());
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    return (
                        Status::with_message(StatusCode::Unavailable, "connection closed"),
                        Vec::new(),
                    )
                }
                Err(err) => {
                    return (
                        Status::with_message(StatusCode::Internal, err.to_string()),
                        Vec::new(),
                    )
                }
            }
        }
    }

    fn shutdown(&self) {
        if self.state.to_shutdown() {
            self.cancel.cancel();
            self.publish_conns.lock().clear();
            *self.handle.write() = None;
            if let Some(runtime) = self.runtime.lock().take() {
                runtime.shutdown_background();
            }
        }
    }
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tests;
