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

//! The [`Node`] abstraction: a duplex connection to the upstream node that
//! both streams notifications (new/disconnected block, new transaction)
//! and answers enrichment calls (fetch a block or transaction by id). A
//! real connection keeps these on separate sockets so a burst of
//! notifications never blocks a pending call, and vice versa (see
//! [`crate::infra::node::WsNode`]); both sides are described by the same
//! trait so tests can substitute an in-memory double.

use chainhook_common::domain::ids::{BlockHash, TxId};
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to upstream node failed")]
    Connect(#[source] chainhook_common::BoxError),

    #[error("upstream node closed the connection")]
    Disconnected,

    #[error("upstream node returned an error response: {0}")]
    Rpc(String),

    #[error("could not decode upstream node message")]
    Decode(#[source] serde_json::Error),
}

/// A duplex connection to the upstream node.
#[trait_variant::make(Send)]
pub trait Node {
    /// A stream of live notifications. Reconnects transparently; the
    /// stream only ends if the listener drops it.
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, Error>;

    /// Fetch a block by hash, with its transaction ids but not their full
    /// bodies (`verbose=true, verbosetx=false` in the upstream's terms).
    /// `None` means the upstream returned an empty result, which happens
    /// when the block has already been reorged out between the
    /// notification firing and this call landing.
    async fn get_block(&self, hash: &BlockHash) -> Result<Option<RpcBlock>, Error>;

    /// Fetch a transaction by id, verbose (decoded inputs/outputs).
    async fn get_raw_transaction(&self, txid: &TxId) -> Result<RpcTransaction, Error>;
}

/// A live event pushed by the upstream node's notification channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BlockConnected { hash: BlockHash, height: u32 },
    BlockDisconnected { hash: BlockHash, height: u32 },
    TxAccepted(RpcTransaction),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RpcBlock {
    pub hash: BlockHash,
    pub height: u32,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    pub difficulty: f64,
    pub time: u64,
    pub tx: Vec<TxId>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RpcTransaction {
    pub txid: TxId,
    #[serde(default)]
    pub confirmations: u32,
    pub blockhash: Option<BlockHash>,
    pub vin: Vec<RpcVin>,
    pub vout: Vec<RpcVout>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RpcVin {
    /// Present only for a coinbase input, which carries no spendable
    /// previous output and is dropped during normalization.
    pub coinbase: Option<String>,
    pub txid: Option<TxId>,
    pub vout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RpcVout {
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RpcScriptPubKey,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RpcScriptPubKey {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}
