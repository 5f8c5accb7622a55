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

//! The normalized raw event emitted by the Listener and consumed by the
//! Processor. Field names deliberately mirror the short keys used on the
//! ingest queue wire (`t`, `o`, `i`, `a`, `v`, `c`, `b`, `h`, `d`, `p`, `ts`,
//! `tx`) to keep queue items small; the Processor translates them to long
//! form when building the outbound webhook payload (see
//! [`crate::domain::payload`]).

use crate::domain::{
    ids::{Address, BlockHash, TxId},
    money::Satoshis,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A normalized event ready to be pushed onto the ingest queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RawEvent {
    #[serde(rename = "newblock")]
    NewBlock(NewBlock),

    #[serde(rename = "discblock")]
    DiscBlock(DiscBlock),

    #[serde(rename = "newtrans")]
    NewTrans(NewTrans),
}

impl RawEvent {
    /// Encode as the compact JSON representation stored on the ingest queue.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Encode)
    }

    /// Decode a raw event as read back off the ingest queue.
    pub fn decode(s: &str) -> Result<Self, Error> {
        serde_json::from_str(s).map_err(Error::Decode)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::NewBlock(_) => "newblock",
            RawEvent::DiscBlock(_) => "discblock",
            RawEvent::NewTrans(_) => "newtrans",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlock {
    #[serde(rename = "b")]
    pub hash: BlockHash,

    #[serde(rename = "h")]
    pub height: u32,

    #[serde(rename = "p")]
    pub prev_hash: BlockHash,

    #[serde(rename = "d")]
    pub difficulty: f64,

    #[serde(rename = "ts")]
    pub time: u64,

    #[serde(rename = "tx")]
    pub tx_ids: Vec<TxId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscBlock {
    #[serde(rename = "b")]
    pub hash: BlockHash,

    #[serde(rename = "h")]
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrans {
    #[serde(rename = "t")]
    pub txid: TxId,

    #[serde(rename = "i")]
    pub inputs: Vec<TxSide>,

    #[serde(rename = "o")]
    pub outputs: Vec<TxSide>,

    #[serde(rename = "c")]
    pub confirmations: u32,

    #[serde(rename = "b")]
    pub block_hash: Option<BlockHash>,
}

impl NewTrans {
    /// The set of unique addresses across all non-dropped inputs and
    /// outputs, used by the Processor to match address subscribers.
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .flat_map(|side| side.addresses.iter().cloned())
            .collect::<Vec<_>>();
        addresses.sort_by(|a, b| a.0.cmp(&b.0));
        addresses.dedup();
        addresses
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxSide {
    #[serde(rename = "a")]
    pub addresses: Vec<Address>,

    #[serde(rename = "v")]
    pub value: Satoshis,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot encode raw event")]
    Encode(#[source] serde_json::Error),

    #[error("cannot decode raw event")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trans() -> NewTrans {
        NewTrans {
            txid: TxId("deadbeef".into()),
            inputs: vec![TxSide {
                addresses: vec![Address("ADDR1".into())],
                value: Satoshis(100),
            }],
            outputs: vec![
                TxSide {
                    addresses: vec![Address("ADDR2".into())],
                    value: Satoshis(25_000_000),
                },
                TxSide {
                    addresses: vec![Address("ADDR1".into())],
                    value: Satoshis(5),
                },
            ],
            confirmations: 1,
            block_hash: Some(BlockHash("blockhash".into())),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let event = RawEvent::NewTrans(sample_trans());
        let encoded = event.encode().unwrap();
        let decoded = RawEvent::decode(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn uses_compact_wire_keys() {
        let event = RawEvent::NewBlock(NewBlock {
            hash: BlockHash("H".into()),
            height: 100,
            prev_hash: BlockHash("G".into()),
            difficulty: 1.0,
            time: 1_700_000_000,
            tx_ids: vec![TxId("t1".into()), TxId("t2".into())],
        });

        let encoded = event.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["kind"], "newblock");
        assert_eq!(value["b"], "H");
        assert_eq!(value["h"], 100);
        assert_eq!(value["p"], "G");
        assert_eq!(value["tx"], serde_json::json!(["t1", "t2"]));
    }

    #[test]
    fn addresses_are_deduplicated_across_sides() {
        let trans = sample_trans();
        let addresses = trans.addresses();
        assert_eq!(
            addresses,
            vec![Address("ADDR1".into()), Address("ADDR2".into())]
        );
    }
}
