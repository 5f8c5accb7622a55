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

//! The processor's main loop: reliably pop a normalized event, match it
//! against the subscriber store, materialize one outbound row per match
//! in a single transaction, and enqueue a delivery token per row.

use chainhook_common::{
    domain::{
        event::RawEvent,
        payload::{self, PayloadType},
        subscriber::{MatchedSubscriber, NewOutboundEvent},
    },
    infra::{
        queue::{EventQueue, QueueName},
        store::SubscriberStore,
    },
};
use fastrace::trace;
use log::{debug, info, warn};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::signal::unix::Signal;

/// The delivery method tag prefixed to every token pushed onto the
/// delivery queue, e.g. `webhook_142`. A second method (for a future
/// delivery transport other than HTTP) would share the queue and be
/// told apart by this prefix.
const METHOD_WEBHOOK: &str = "webhook";

pub async fn run(
    queue: impl EventQueue,
    store: impl SubscriberStore,
    poll_timeout: Duration,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let reclaimed = queue.reclaim(QueueName::Ingest).await?;
    if reclaimed > 0 {
        info!(reclaimed; "reclaimed in-flight ingest items left by a previous instance");
    }

    info!("processor started");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("shutdown signal received, stopping processor");
                return Ok(());
            }

            popped = queue.reliable_pop(QueueName::Ingest, poll_timeout) => {
                let Some(raw) = popped? else {
                    continue;
                };

                if let Err(error) = process_one(&queue, &store, &raw).await {
                    warn!(error:?; "failed to process event, leaving it in flight for reclaim");
                    continue;
                }

                queue.ack(QueueName::Ingest, &raw).await?;
            }
        }
    }
}

#[trace]
async fn process_one(
    queue: &impl EventQueue,
    store: &impl SubscriberStore,
    raw: &str,
) -> anyhow::Result<()> {
    let event = RawEvent::decode(raw)?;
    let origin_time = OffsetDateTime::now_utc().unix_timestamp();

    let (matches, payload_type, data) = match &event {
        RawEvent::NewTrans(trans) => {
            let addresses = trans.addresses();
            let matches = store.find_address_subscribers(&addresses).await?;
            (matches, PayloadType::Address, payload::translate_trans(trans))
        }

        RawEvent::NewBlock(block) => {
            let matches = store.find_new_block_subscribers().await?;
            (matches, PayloadType::NewBlock, payload::translate_block(block))
        }

        RawEvent::DiscBlock(disc) => {
            let matches = store.find_disc_block_subscribers().await?;
            (
                matches,
                PayloadType::DiscBlock,
                payload::translate_discblock(&disc.hash, disc.height),
            )
        }
    };

    if matches.is_empty() {
        debug!(kind = event.kind(); "no subscriber matched event");
        return Ok(());
    }

    let outbound = build_outbound_events(matches, payload_type, data, origin_time)?;
    let ids = store.save_outbound_events(&outbound).await?;

    for id in ids {
        let token = format!("{METHOD_WEBHOOK}_{id}");
        queue.push(QueueName::Delivery, &token).await?;
    }

    Ok(())
}

/// Build one outbound row per matched subscriber. A subscriber that
/// watches two matching addresses on the same transaction is matched
/// twice by the store and so produces two distinct outbound rows, each
/// with its own event id.
fn build_outbound_events(
    matches: Vec<MatchedSubscriber>,
    payload_type: PayloadType,
    data: serde_json::Value,
    origin_time: i64,
) -> anyhow::Result<Vec<NewOutboundEvent>> {
    matches
        .into_iter()
        .map(|matched| {
            let envelope = payload::build_payload(
                matched.subscriber_id,
                origin_time,
                payload_type,
                data.clone(),
                matched.address.as_ref(),
            );
            Ok(NewOutboundEvent {
                subscriber_id: matched.subscriber_id,
                payload: serde_json::to_vec(&envelope)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chainhook_common::domain::ids::{Address, SubscriberId};

    #[test]
    fn builds_one_outbound_event_per_match() {
        let matches = vec![
            MatchedSubscriber {
                subscriber_id: SubscriberId(uuid::Uuid::nil()),
                webhook: "https://a.test".into(),
                address: Some(Address("ADDR1".into())),
            },
            MatchedSubscriber {
                subscriber_id: SubscriberId(uuid::Uuid::nil()),
                webhook: "https://a.test".into(),
                address: Some(Address("ADDR2".into())),
            },
        ];

        let data = serde_json::json!({"txid": "t"});
        let outbound =
            build_outbound_events(matches, PayloadType::Address, data, 0).unwrap();

        assert_eq!(outbound.len(), 2);
        let first: serde_json::Value = serde_json::from_slice(&outbound[0].payload).unwrap();
        assert_eq!(first["address"], "ADDR1");
        let second: serde_json::Value = serde_json::from_slice(&outbound[1].payload).unwrap();
        assert_eq!(second["address"], "ADDR2");
        assert_ne!(first["data"]["event_id"], second["data"]["event_id"]);
    }

    #[test]
    fn delivery_token_format_is_method_prefixed() {
        let token = format!("{METHOD_WEBHOOK}_{}", 142);
        assert_matches!(token.as_str(), "webhook_142");
    }
}
