// This file is part of chainhook.
// Copyright (C) 2026 Chainhook Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A single WebSocket connection to the upstream node's JSON-RPC server,
//! with connect-time authentication and reconnect-with-backoff. One
//! [`Transport`] handles exactly one logical connection (either the
//! request/response "caller" side or the notification "notifier" side);
//! [`crate::infra::node::WsNode`] owns one of each.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
    tungstenite::{Message, client::IntoClientRequest},
};
use url::Url;

use crate::domain::node::Error;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: Url,
    pub rpc_user: String,
    pub rpc_pass: String,
    pub ca_cert_path: Option<String>,
    pub retry: u32,
}

pub struct Transport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport {
    /// Connect and authenticate, retrying with exponential backoff plus
    /// jitter (`2^attempt` seconds, capped implicitly by `retry`) the way
    /// the upstream node's own client libraries do.
    pub async fn connect(config: &TransportConfig) -> Result<Self, Error> {
        let attempts = config.retry.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match Self::connect_once(config).await {
                Ok(transport) => return Ok(transport),
                Err(error) => {
                    log::warn!(attempt, error:%; "failed to connect to upstream node");
                    last_error = Some(error);

                    if attempt + 1 < attempts {
                        let backoff = Duration::from_secs_f64(
                            2f64.powi(attempt as i32) + rand::thread_rng().r#gen::<f64>(),
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(Error::Disconnected))
    }

    async fn connect_once(config: &TransportConfig) -> Result<Self, Error> {
        let connector = config
            .ca_cert_path
            .as_ref()
            .map(|path| load_tls_connector(path))
            .transpose()?;

        let request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|error| Error::Connect(Box::new(error)))?;

        let (socket, _response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|error| Error::Connect(Box::new(error)))?;

        let mut transport = Self { socket };
        transport
            .send(&Request {
                method: "authenticate",
                id: "auth",
                params: vec![config.rpc_user.clone().into(), config.rpc_pass.clone().into()],
            })
            .await?;
        let response = transport.recv().await?;
        if response.get("id").and_then(Value::as_str) != Some("auth") {
            return Err(Error::Rpc("unexpected id for authenticate".into()));
        }

        Ok(transport)
    }

    /// Send a JSON-RPC request with an id derived from `method` and block
    /// for the matching response, returning its `result` field.
    pub async fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        let id = format!("{method}_");
        self.send(&Request {
            method,
            id: &id,
            params,
        })
        .await?;

        loop {
            let message = self.recv().await?;
            if message.get("id").and_then(Value::as_str) == Some(id.as_str()) {
                if let Some(error) = message.get("error").filter(|e| !e.is_null()) {
                    return Err(Error::Rpc(error.to_string()));
                }
                return Ok(message.get("result").cloned().unwrap_or(Value::Null));
            }
            // A message for a different id (e.g. a notification arriving
            // on this connection) is discarded; the notifier and caller
            // sockets are never shared in practice.
        }
    }

    /// Subscribe to a notification class. `notifynewtransactions` is asked
    /// to be verbose (`params: [true]`); `notifyblocks` takes no params at
    /// all, matching the upstream node's own subscription wire format.
    pub async fn send_notification_request(
        &mut self,
        method: &str,
        id: &str,
        params: Vec<Value>,
    ) -> Result<(), Error> {
        self.send(&Request { method, id, params }).await?;

        let message = self.recv().await?;
        if message.get("id").and_then(Value::as_str) != Some(id) {
            return Err(Error::Rpc(format!("unexpected id for {method} subscription")));
        }
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Value, Error> {
        loop {
            let message = self.socket.next().await.ok_or(Error::Disconnected)?;
            let message = message.map_err(|error| Error::Connect(Box::new(error)))?;
            match message {
                Message::Text(text) => {
                    return serde_json::from_str(&text).map_err(Error::Decode);
                }
                Message::Close(_) => return Err(Error::Disconnected),
                _ => continue,
            }
        }
    }

    async fn send(&mut self, request: &Request<'_>) -> Result<(), Error> {
        let text = serde_json::to_string(request).map_err(Error::Decode)?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| Error::Connect(Box::new(error)))
    }
}

#[derive(Serialize)]
struct Request<'a> {
    method: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<Value>,
}

fn load_tls_connector(ca_cert_path: &str) -> Result<Connector, Error> {
    let pem = std::fs::read(ca_cert_path).map_err(|error| Error::Connect(Box::new(error)))?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| Error::Connect(Box::new(error)))?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(|error| Error::Connect(Box::new(error)))?;
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Connector::Rustls(std::sync::Arc::new(tls_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifyblocks_request_carries_no_params_key() {
        let request = Request {
            method: "notifyblocks",
            id: "nb",
            params: vec![],
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert!(encoded.get("params").is_none());
        assert_eq!(encoded["method"], "notifyblocks");
        assert_eq!(encoded["id"], "nb");
    }

    #[test]
    fn notifynewtransactions_request_carries_a_verbose_flag() {
        let request = Request {
            method: "notifynewtransactions",
            id: "ntt",
            params: vec![Value::Bool(true)],
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["params"], serde_json::json!([true]));
    }

    #[test]
    fn every_request_carries_method_id_and_params_fields_used_by_the_upstream() {
        let request = Request {
            method: "getblock",
            id: "getblock_",
            params: vec![Value::String("H".into()), Value::Bool(true), Value::Bool(false)],
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["method"], "getblock");
        assert_eq!(encoded["id"], "getblock_");
        assert_eq!(
            encoded["params"],
            serde_json::json!(["H", true, false])
        );
    }
}
