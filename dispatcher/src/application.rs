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

//! The dispatcher's main loop: reliably pop a delivery token, look up its
//! outbound row, POST the payload, and record the outcome. Retryable
//! failures are left in the delivery queue's in-flight list and recovered
//! by periodic reclaim sweeps.

use crate::infra::http::{DeliveryOutcome, WebhookClient};
use chainhook_common::{
    domain::ids::OutboundEventId,
    infra::{
        queue::{EventQueue, QueueName},
        store::{AttemptOutcome, SubscriberStore},
    },
};
use fastrace::trace;
use log::{debug, info, warn};
use rand::Rng;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::signal::unix::Signal;

const METHOD_WEBHOOK: &str = "webhook";

/// The attempt-count and age limits past which a retryable delivery is
/// given up on rather than retried forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub max_age: Duration,
}

impl RetryBudget {
    fn exhausted(&self, attempts_after_this_one: u32, created_at: OffsetDateTime) -> bool {
        attempts_after_this_one >= self.max_attempts
            || OffsetDateTime::now_utc() - created_at
                >= time::Duration::try_from(self.max_age).unwrap_or(time::Duration::MAX)
    }
}

/// Outcome of handling one popped token, telling the main loop whether to
/// ack it (done, one way or another) or leave it in flight for retry.
enum TokenOutcome {
    Consumed,
    Retry,
}

pub async fn run(
    queue: impl EventQueue,
    store: impl SubscriberStore,
    http: WebhookClient,
    retry_budget: RetryBudget,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let reclaimed = queue.reclaim(QueueName::Delivery).await?;
    if reclaimed > 0 {
        info!(reclaimed; "reclaimed in-flight delivery tokens left by a previous instance");
    }

    info!("dispatcher started");

    // Block indefinitely while nothing is in flight; a retryable failure
    // switches to a short randomized timeout so a stalled pop triggers a
    // reclaim sweep instead of waiting forever.
    let mut block_timeout = Duration::ZERO;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("shutdown signal received, stopping dispatcher");
                return Ok(());
            }

            popped = queue.reliable_pop(QueueName::Delivery, block_timeout) => {
                let Some(token) = popped? else {
                    let reclaimed = queue.reclaim(QueueName::Delivery).await?;
                    if reclaimed > 0 {
                        debug!(reclaimed; "reclaim sweep requeued stalled delivery tokens");
                        block_timeout = Duration::ZERO;
                    }
                    continue;
                };

                match dispatch_token(&store, &http, &retry_budget, &token).await {
                    TokenOutcome::Consumed => {
                        queue.ack(QueueName::Delivery, &token).await?;
                        if queue.inflight_len(QueueName::Delivery).await? == 0 {
                            block_timeout = Duration::ZERO;
                        }
                    }
                    TokenOutcome::Retry => {
                        block_timeout = Duration::from_secs(rand::thread_rng().gen_range(1..=3));
                    }
                }
            }
        }
    }
}

#[trace]
async fn dispatch_token(
    store: &impl SubscriberStore,
    http: &WebhookClient,
    retry_budget: &RetryBudget,
    token: &str,
) -> TokenOutcome {
    let Some(outbound_id) = parse_token(token) else {
        warn!(token; "discarding delivery token with an unrecognized method");
        return TokenOutcome::Consumed;
    };

    let target = match store.find_dispatch_target(outbound_id).await {
        Ok(target) => target,
        Err(error) => {
            warn!(error:?, outbound_id:?; "failed to look up dispatch target, will retry");
            return TokenOutcome::Retry;
        }
    };

    let Some(target) = target else {
        debug!(outbound_id:?; "dispatch target no longer exists: already sent or subscriber cancelled");
        return TokenOutcome::Consumed;
    };

    let delivery = http.deliver(&target.webhook, target.payload.clone()).await;

    let (store_outcome, token_outcome) = match delivery {
        DeliveryOutcome::Sent => (AttemptOutcome::Sent, TokenOutcome::Consumed),
        DeliveryOutcome::Retry { reason } => {
            if retry_budget.exhausted(target.attempts + 1, target.created_at) {
                warn!(outbound_id:?, reason; "retry budget exhausted, giving up on this delivery");
                (AttemptOutcome::GaveUp, TokenOutcome::Consumed)
            } else {
                debug!(outbound_id:?, reason; "delivery failed, will retry");
                (AttemptOutcome::Retrying, TokenOutcome::Retry)
            }
        }
    };

    if let Err(error) = store.complete_attempt(target.outbound_id, store_outcome).await {
        warn!(error:?, outbound_id:?; "failed to record delivery attempt outcome, will retry");
        return TokenOutcome::Retry;
    }

    token_outcome
}

/// Parse a delivery token of the form `<method>_<outbound_id>`. Only the
/// `webhook` method is defined; any other prefix, or a malformed id, is
/// logged and dropped rather than retried forever.
fn parse_token(token: &str) -> Option<OutboundEventId> {
    let id = token.strip_prefix(METHOD_WEBHOOK)?.strip_prefix('_')?;
    id.parse::<i64>().ok().map(OutboundEventId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_webhook_tokens() {
        assert_eq!(parse_token("webhook_142"), Some(OutboundEventId(142)));
    }

    #[test]
    fn rejects_unknown_methods_and_malformed_ids() {
        assert_eq!(parse_token("carrier_pigeon_1"), None);
        assert_eq!(parse_token("webhook_not-a-number"), None);
        assert_eq!(parse_token("webhook_"), None);
    }

    #[test]
    fn retry_budget_exhausts_on_attempt_count() {
        let budget = RetryBudget {
            max_attempts: 3,
            max_age: Duration::from_secs(3600),
        };
        assert!(!budget.exhausted(2, OffsetDateTime::now_utc()));
        assert!(budget.exhausted(3, OffsetDateTime::now_utc()));
    }

    #[test]
    fn retry_budget_exhausts_on_age() {
        let budget = RetryBudget {
            max_attempts: 100,
            max_age: Duration::from_secs(60),
        };
        let created_at = OffsetDateTime::now_utc() - time::Duration::seconds(120);
        assert!(budget.exhausted(1, created_at));
    }
}
