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

//! Construction of the outbound webhook JSON payload from a normalized
//! [`RawEvent`], translating its compact wire field names to the long-form
//! names the payload schema requires.

use crate::domain::{
    event::{NewBlock, NewTrans, TxSide},
    ids::{Address, SubscriberId},
};
use serde_json::{Value, json};
use uuid::Uuid;

/// The external event type tag carried in the payload envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Address,
    NewBlock,
    DiscBlock,
}

impl PayloadType {
    fn as_str(self) -> &'static str {
        match self {
            PayloadType::Address => "address",
            PayloadType::NewBlock => "newblock",
            PayloadType::DiscBlock => "discblock",
        }
    }
}

/// Translate a [`TxSide`] (compact `a`/`v` keys) to the long-form
/// `address`/`value` keys used in the outbound payload.
fn translate_side(side: &TxSide) -> Value {
    json!({
        "address": side.addresses,
        "value": side.value.0,
    })
}

/// Translate a [`NewTrans`] to the `data` object of an `address` payload,
/// per the `t→txid, o→output, i→input, a→address, v→value, c→confirmations,
/// b→block_hash` mapping.
pub fn translate_trans(trans: &NewTrans) -> Value {
    json!({
        "txid": trans.txid,
        "input": trans.inputs.iter().map(translate_side).collect::<Vec<_>>(),
        "output": trans.outputs.iter().map(translate_side).collect::<Vec<_>>(),
        "confirmations": trans.confirmations,
        "block_hash": trans.block_hash,
    })
}

/// Translate a [`NewBlock`] to the `data` object of a `newblock` payload,
/// per the `b→block_hash, h→height, p→previousblockhash, d→difficulty,
/// ts→time, tx→tx` mapping.
pub fn translate_block(block: &NewBlock) -> Value {
    json!({
        "block_hash": block.hash,
        "height": block.height,
        "previousblockhash": block.prev_hash,
        "difficulty": block.difficulty,
        "time": block.time,
        "tx": block.tx_ids,
    })
}

/// Translate a disconnected-block event (`hash`, `height`) to the `data`
/// object of a `discblock` payload. The wire schema follows the same shape
/// as `newblock`, restricted to the fields a disconnect notification
/// actually carries.
pub fn translate_discblock(hash: &crate::domain::ids::BlockHash, height: u32) -> Value {
    json!({
        "block_hash": hash,
        "height": height,
    })
}

/// Build the full outbound JSON payload for one (event, subscriber) match.
///
/// `data` must already carry the translated, event-specific fields (see
/// `translate_*` above); this wraps it with the common envelope and, for
/// address events, the top-level `address` field.
pub fn build_payload(
    subscriber_id: SubscriberId,
    origin_time: i64,
    payload_type: PayloadType,
    mut data: Value,
    address: Option<&Address>,
) -> Value {
    let event_id = Uuid::new_v4();

    if let Value::Object(ref mut map) = data {
        map.insert("event_id".to_owned(), json!(event_id));
    }

    let mut envelope = json!({
        "id": subscriber_id,
        "origin_time": origin_time,
        "type": payload_type.as_str(),
        "data": data,
    });

    if let (PayloadType::Address, Some(address)) = (payload_type, address) {
        envelope["address"] = json!(address);
    }

    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        event::TxSide,
        ids::{BlockHash, TxId},
        money::Satoshis,
    };

    #[test]
    fn address_payload_matches_documented_schema() {
        let trans = NewTrans {
            txid: TxId("tx1".into()),
            inputs: vec![TxSide {
                addresses: vec![Address("ADDR".into())],
                value: Satoshis(150_000_000),
            }],
            outputs: vec![TxSide {
                addresses: vec![Address("OTHER".into())],
                value: Satoshis(25_000_000),
            }],
            confirmations: 1,
            block_hash: None,
        };

        let data = translate_trans(&trans);
        let payload = build_payload(
            SubscriberId(Uuid::nil()),
            1_700_000_000,
            PayloadType::Address,
            data,
            Some(&Address("ADDR".into())),
        );

        assert_eq!(payload["type"], "address");
        assert_eq!(payload["address"], "ADDR");
        assert_eq!(payload["data"]["input"][0]["address"][0], "ADDR");
        assert_eq!(payload["data"]["input"][0]["value"], 150_000_000);
        assert_eq!(payload["data"]["output"][0]["value"], 25_000_000);
        assert!(payload["data"]["event_id"].is_string());
    }

    #[test]
    fn newblock_payload_matches_documented_schema() {
        let block = NewBlock {
            hash: BlockHash("H".into()),
            height: 100,
            prev_hash: BlockHash("G".into()),
            difficulty: 1.0,
            time: 1_700_000_000,
            tx_ids: vec![TxId("t1".into()), TxId("t2".into())],
        };

        let data = translate_block(&block);
        let payload = build_payload(
            SubscriberId(Uuid::nil()),
            1_700_000_000,
            PayloadType::NewBlock,
            data,
            None,
        );

        assert_eq!(payload["type"], "newblock");
        assert_eq!(payload["data"]["block_hash"], "H");
        assert_eq!(payload["data"]["height"], 100);
        assert_eq!(payload["data"]["previousblockhash"], "G");
        assert_eq!(payload["data"]["tx"], json!(["t1", "t2"]));
        assert!(payload.get("address").is_none());
    }

    #[test]
    fn two_distinct_matches_get_distinct_event_ids() {
        let block = NewBlock {
            hash: BlockHash("H".into()),
            height: 1,
            prev_hash: BlockHash("G".into()),
            difficulty: 1.0,
            time: 0,
            tx_ids: vec![],
        };

        let p1 = build_payload(
            SubscriberId(Uuid::nil()),
            0,
            PayloadType::NewBlock,
            translate_block(&block),
            None,
        );
        let p2 = build_payload(
            SubscriberId(Uuid::nil()),
            0,
            PayloadType::NewBlock,
            translate_block(&block),
            None,
        );

        assert_ne!(p1["data"]["event_id"], p2["data"]["event_id"]);
    }
}
