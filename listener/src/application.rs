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

//! The listener's main loop: consume notifications from the upstream
//! node, enrich and normalize them, and push the result onto the ingest
//! queue for the processor.

use crate::domain::node::{Node, Notification, RpcTransaction};
use chainhook_common::{
    domain::{
        event::{NewBlock, NewTrans, RawEvent, TxSide},
        ids::Address,
        money::Satoshis,
    },
    infra::queue::{EventQueue, QueueName},
};
use fastrace::trace;
use futures::StreamExt;
use log::{info, warn};
use tokio::signal::unix::Signal;

/// scriptPubKey types the upstream node reports for an output that has no
/// usable address (an anchor/commitment output or pure data); dropped
/// before an event ever reaches a subscriber.
const DROPPED_SCRIPT_TYPES: [&str; 2] = ["nonstandard", "nulldata"];

pub async fn run(node: impl Node, queue: impl EventQueue, mut sigterm: Signal) -> anyhow::Result<()> {
    let mut notifications = Box::pin(node.notifications().await?);

    info!("listener started, awaiting notifications");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("shutdown signal received, stopping listener");
                return Ok(());
            }

            notification = notifications.next() => {
                let Some(notification) = notification else {
                    anyhow::bail!("notification stream ended unexpectedly");
                };

                if let Err(error) = handle_notification(&node, &queue, notification).await {
                    warn!(error:?; "failed to handle notification, continuing");
                }
            }
        }
    }
}

#[trace]
async fn handle_notification(
    node: &impl Node,
    queue: &impl EventQueue,
    notification: Notification,
) -> anyhow::Result<()> {
    let event = match notification {
        Notification::BlockConnected { hash, height } => {
            let Some(block) = node.get_block(&hash).await? else {
                info!(hash:%, height; "getblock returned an empty result, dropping (reorg artifact)");
                return Ok(());
            };
            if block.height != height {
                anyhow::bail!("getblock returned height {} for notified height {height}", block.height);
            }
            RawEvent::NewBlock(normalize_block(block))
        }

        Notification::BlockDisconnected { hash, height } => {
            RawEvent::DiscBlock(chainhook_common::domain::event::DiscBlock { hash, height })
        }

        Notification::TxAccepted(tx) => RawEvent::NewTrans(normalize_trans(node, tx).await?),
    };

    let encoded = event.encode()?;
    queue.push(QueueName::Ingest, &encoded).await?;

    Ok(())
}

fn normalize_block(block: crate::domain::node::RpcBlock) -> NewBlock {
    NewBlock {
        hash: block.hash,
        height: block.height,
        prev_hash: block.previous_block_hash,
        difficulty: block.difficulty,
        time: block.time,
        tx_ids: block.tx,
    }
}

/// Normalize a verbose transaction: drop coinbase inputs (they spend
/// nothing) and nonstandard/null-data outputs (they carry no address),
/// and resolve each remaining input's address and value by fetching the
/// transaction it spends from.
async fn normalize_trans(node: &impl Node, tx: RpcTransaction) -> anyhow::Result<NewTrans> {
    let mut inputs = Vec::new();
    for vin in &tx.vin {
        if vin.coinbase.is_some() {
            continue;
        }
        let Some(prev_txid) = vin.txid.clone() else {
            continue;
        };
        let Some(prev_index) = vin.vout else {
            continue;
        };

        let prev_tx = node.get_raw_transaction(&prev_txid).await?;
        let Some(prev_out) = prev_tx.vout.get(prev_index as usize) else {
            continue;
        };

        inputs.push(TxSide {
            addresses: prev_out
                .script_pub_key
                .addresses
                .iter()
                .cloned()
                .map(Address)
                .collect(),
            value: Satoshis::from_btc(prev_out.value),
        });
    }

    let outputs = tx
        .vout
        .iter()
        .filter(|vout| !DROPPED_SCRIPT_TYPES.contains(&vout.script_pub_key.kind.as_str()))
        .map(|vout| TxSide {
            addresses: vout
                .script_pub_key
                .addresses
                .iter()
                .cloned()
                .map(Address)
                .collect(),
            value: Satoshis::from_btc(vout.value),
        })
        .collect();

    Ok(NewTrans {
        txid: tx.txid,
        inputs,
        outputs,
        confirmations: tx.confirmations,
        block_hash: tx.blockhash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{Error, RpcBlock, RpcScriptPubKey, RpcVin, RpcVout};
    use assert_matches::assert_matches;
    use chainhook_common::domain::ids::{BlockHash, TxId};
    use futures::stream;
    use tokio::sync::Mutex;

    struct FakeNode {
        prev_txs: Vec<RpcTransaction>,
        block: Option<RpcBlock>,
    }

    impl Node for FakeNode {
        async fn notifications(&self) -> Result<futures::stream::BoxStream<'static, Notification>, Error> {
            Ok(Box::pin(stream::empty()))
        }

        async fn get_block(&self, _hash: &BlockHash) -> Result<Option<RpcBlock>, Error> {
            Ok(self.block.clone())
        }

        async fn get_raw_transaction(&self, txid: &TxId) -> Result<RpcTransaction, Error> {
            self.prev_txs
                .iter()
                .find(|tx| &tx.txid == txid)
                .cloned()
                .ok_or(Error::Rpc("no such transaction".into()))
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        pushed: Mutex<Vec<(QueueName, String)>>,
    }

    impl EventQueue for FakeQueue {
        async fn push(&self, queue: QueueName, item: &str) -> Result<(), chainhook_common::infra::queue::Error> {
            self.pushed.lock().await.push((queue, item.to_owned()));
            Ok(())
        }

        async fn reliable_pop(
            &self,
            _queue: QueueName,
            _timeout: std::time::Duration,
        ) -> Result<Option<String>, chainhook_common::infra::queue::Error> {
            unimplemented!()
        }

        async fn ack(&self, _queue: QueueName, _item: &str) -> Result<(), chainhook_common::infra::queue::Error> {
            unimplemented!()
        }

        async fn reclaim(&self, _queue: QueueName) -> Result<u64, chainhook_common::infra::queue::Error> {
            unimplemented!()
        }

        async fn inflight_len(&self, _queue: QueueName) -> Result<u64, chainhook_common::infra::queue::Error> {
            unimplemented!()
        }
    }

    fn script(kind: &str, addresses: &[&str]) -> RpcScriptPubKey {
        RpcScriptPubKey {
            kind: kind.to_owned(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn drops_coinbase_inputs_and_nonstandard_outputs() {
        let prev_tx = RpcTransaction {
            txid: TxId("prev".into()),
            confirmations: 10,
            blockhash: None,
            vin: vec![],
            vout: vec![RpcVout {
                value: 1.5,
                script_pub_key: script("pubkeyhash", &["ADDR1"]),
            }],
        };

        let node = FakeNode {
            prev_txs: vec![prev_tx],
            block: None,
        };

        let tx = RpcTransaction {
            txid: TxId("cur".into()),
            confirmations: 0,
            blockhash: None,
            vin: vec![
                RpcVin {
                    coinbase: Some("abcd".into()),
                    txid: None,
                    vout: None,
                },
                RpcVin {
                    coinbase: None,
                    txid: Some(TxId("prev".into())),
                    vout: Some(0),
                },
            ],
            vout: vec![
                RpcVout {
                    value: 0.25,
                    script_pub_key: script("pubkeyhash", &["ADDR2"]),
                },
                RpcVout {
                    value: 0.0,
                    script_pub_key: script("nulldata", &[]),
                },
            ],
        };

        let normalized = normalize_trans(&node, tx).await.unwrap();

        assert_eq!(normalized.inputs.len(), 1);
        assert_eq!(normalized.inputs[0].value, Satoshis(150_000_000));
        assert_eq!(normalized.outputs.len(), 1);
        assert_eq!(normalized.outputs[0].value, Satoshis(25_000_000));
    }

    #[tokio::test]
    async fn block_connected_emits_a_normalized_new_block() {
        let node = FakeNode {
            prev_txs: vec![],
            block: Some(RpcBlock {
                hash: BlockHash("H".into()),
                height: 100,
                previous_block_hash: BlockHash("G".into()),
                difficulty: 1.0,
                time: 1_700_000_000,
                tx: vec![TxId("t1".into()), TxId("t2".into())],
            }),
        };
        let queue = FakeQueue::default();

        handle_notification(
            &node,
            &queue,
            Notification::BlockConnected {
                hash: BlockHash("H".into()),
                height: 100,
            },
        )
        .await
        .unwrap();

        let pushed = queue.pushed.lock().await;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, QueueName::Ingest);
        let event = RawEvent::decode(&pushed[0].1).unwrap();
        assert_matches!(event, RawEvent::NewBlock(ref b) if b.height == 100 && b.hash == BlockHash("H".into()));
    }

    #[tokio::test]
    async fn empty_getblock_result_is_dropped_without_emitting_an_event() {
        let node = FakeNode {
            prev_txs: vec![],
            block: None,
        };
        let queue = FakeQueue::default();

        handle_notification(
            &node,
            &queue,
            Notification::BlockConnected {
                hash: BlockHash("H".into()),
                height: 100,
            },
        )
        .await
        .unwrap();

        assert!(queue.pushed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn mismatched_height_from_getblock_is_an_error() {
        let node = FakeNode {
            prev_txs: vec![],
            block: Some(RpcBlock {
                hash: BlockHash("H".into()),
                height: 99,
                previous_block_hash: BlockHash("G".into()),
                difficulty: 1.0,
                time: 0,
                tx: vec![],
            }),
        };
        let queue = FakeQueue::default();

        let result = handle_notification(
            &node,
            &queue,
            Notification::BlockConnected {
                hash: BlockHash("H".into()),
                height: 100,
            },
        )
        .await;

        assert!(result.is_err());
        assert!(queue.pushed.lock().await.is_empty());
    }

    #[tokio::test]
    async fn block_disconnected_emits_a_disc_block_with_no_enrichment() {
        let node = FakeNode {
            prev_txs: vec![],
            block: None,
        };
        let queue = FakeQueue::default();

        handle_notification(
            &node,
            &queue,
            Notification::BlockDisconnected {
                hash: BlockHash("H".into()),
                height: 100,
            },
        )
        .await
        .unwrap();

        let pushed = queue.pushed.lock().await;
        assert_eq!(pushed.len(), 1);
        let event = RawEvent::decode(&pushed[0].1).unwrap();
        assert_matches!(event, RawEvent::DiscBlock(ref d) if d.height == 100);
    }
}
