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

mod transport;

pub use transport::TransportConfig;

use crate::domain::node::{Node, Notification, RpcBlock, RpcTransaction};
use chainhook_common::domain::ids::{BlockHash, TxId};
use fastrace::trace;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use transport::Transport;

use crate::domain::node::Error;

/// [`Node`] implementation using two WebSocket connections to the upstream
/// node: one dedicated to request/response calls, one to notifications.
/// Keeping them separate means a burst of notifications can never delay
/// an in-flight enrichment call, and vice versa.
pub struct WsNode {
    config: TransportConfig,
    caller: Mutex<Transport>,
}

impl WsNode {
    pub async fn connect(config: TransportConfig) -> Result<Self, Error> {
        let caller = Transport::connect(&config).await?;
        Ok(Self {
            config,
            caller: Mutex::new(caller),
        })
    }

    /// Issue a call on the caller connection, reconnecting once and
    /// retrying if the connection was found to be dead.
    async fn call(&self, method: &str, params: Vec<serde_json::Value>) -> Result<serde_json::Value, Error> {
        let mut caller = self.caller.lock().await;
        match caller.call(method, params.clone()).await {
            Ok(result) => Ok(result),
            Err(_) => {
                *caller = Transport::connect(&self.config).await?;
                caller.call(method, params).await
            }
        }
    }
}

impl Node for WsNode {
    #[trace]
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, Error> {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();
        tokio::spawn(notifier_task(config, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    #[trace]
    async fn get_block(&self, hash: &BlockHash) -> Result<Option<RpcBlock>, Error> {
        let result = self
            .call(
                "getblock",
                vec![hash.0.clone().into(), true.into(), false.into()],
            )
            .await?;
        if is_empty_result(&result) {
            return Ok(None);
        }
        serde_json::from_value(result).map(Some).map_err(Error::Decode)
    }

    #[trace]
    async fn get_raw_transaction(&self, txid: &TxId) -> Result<RpcTransaction, Error> {
        let result = self
            .call("getrawtransaction", vec![txid.0.clone().into(), true.into()])
            .await?;
        serde_json::from_value(result).map_err(Error::Decode)
    }
}

/// Owns the long-lived notifier connection: authenticates, subscribes to
/// block and transaction notifications, and forwards each parsed message.
/// Reconnects with backoff on any error and keeps running until the
/// receiver is dropped.
async fn notifier_task(config: TransportConfig, tx: mpsc::Sender<Notification>) {
    loop {
        let mut transport = match Transport::connect(&config).await {
            Ok(transport) => transport,
            Err(error) => {
                log::error!(error:%; "notifier connection permanently failed");
                return;
            }
        };

        if let Err(error) = transport
            .send_notification_request("notifynewtransactions", "ntt", vec![serde_json::Value::Bool(true)])
            .await
        {
            log::warn!(error:%; "failed to subscribe to new transaction notifications");
            continue;
        }
        if let Err(error) = transport
            .send_notification_request("notifyblocks", "nb", vec![])
            .await
        {
            log::warn!(error:%; "failed to subscribe to block notifications");
            continue;
        }

        loop {
            match transport.recv().await {
                Ok(message) => {
                    if let Some(notification) = parse_notification(&message) {
                        if tx.send(notification).await.is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    log::warn!(error:%; "notifier connection lost, reconnecting");
                    break;
                }
            }
        }
    }
}

/// `getblock` returns `null` or an empty object for a hash that has
/// already been reorged out from under the notification; either is
/// indistinguishable from "no block" for normalization purposes.
fn is_empty_result(result: &serde_json::Value) -> bool {
    match result {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn parse_notification(message: &serde_json::Value) -> Option<Notification> {
    let method = message.get("method")?.as_str()?;
    let params = message.get("params")?;

    match method {
        "blockconnected" => {
            let hash = params.get(0)?.as_str()?.to_owned();
            let height = params.get(1)?.as_u64()? as u32;
            Some(Notification::BlockConnected {
                hash: BlockHash(hash),
                height,
            })
        }
        "blockdisconnected" => {
            let hash = params.get(0)?.as_str()?.to_owned();
            let height = params.get(1)?.as_u64()? as u32;
            Some(Notification::BlockDisconnected {
                hash: BlockHash(hash),
                height,
            })
        }
        "txacceptedverbose" => {
            let tx = params.get(0)?.clone();
            serde_json::from_value::<RpcTransaction>(tx)
                .ok()
                .map(Notification::TxAccepted)
        }
        _ => {
            log::debug!(method; "discarding unknown notification method");
            None
        }
    }
}
