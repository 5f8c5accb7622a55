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

//! The subscriber store: subscription lookups used by the processor to
//! match a raw event against registered subscribers, and the durable
//! outbound event records the dispatcher delivers.

pub mod postgres;

use crate::domain::{
    ids::{Address, OutboundEventId},
    subscriber::{DispatchTarget, MatchedSubscriber, NewOutboundEvent},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("subscriber store operation failed")]
pub struct Error(#[source] pub crate::BoxError);

impl Error {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(crate::StdErrorExt::into_box(source))
    }
}

/// Outcome of one dispatcher delivery attempt, applied to the outbound
/// row's status and attempt counter in a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The subscriber acknowledged receipt (a 2xx response, or a read
    /// timeout after the request body was fully sent).
    Sent,
    /// Delivery failed but the row is still within its retry budget.
    Retrying,
    /// The retry budget (attempt count or age) is exhausted.
    GaveUp,
}

/// Subscription lookups and outbound record lifecycle, backing the
/// processor (writer of outbound events) and the dispatcher (reader and
/// mutator of their delivery status).
#[trait_variant::make(Send)]
pub trait SubscriberStore {
    /// Active subscribers watching any of `addresses`, one entry per
    /// matching (subscriber, address) pair.
    async fn find_address_subscribers(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<MatchedSubscriber>, Error>;

    /// Active subscribers registered for every new block.
    async fn find_new_block_subscribers(&self) -> Result<Vec<MatchedSubscriber>, Error>;

    /// Active subscribers registered for block disconnect notifications.
    async fn find_disc_block_subscribers(&self) -> Result<Vec<MatchedSubscriber>, Error>;

    /// Durably insert one outbound row per match, in a single transaction,
    /// returning the assigned ids in the same order as `events`.
    async fn save_outbound_events(
        &self,
        events: &[NewOutboundEvent],
    ) -> Result<Vec<OutboundEventId>, Error>;

    /// Look up one outbound row by id for delivery, if it is still
    /// `pending` or `retrying` and its subscriber is still active. `None`
    /// means the dispatcher should simply drop the delivery token: the
    /// subscriber was deactivated, or another dispatcher instance (there
    /// should never be more than one, see
    /// [`crate::infra::store::postgres::try_acquire_singleton_lock`])
    /// already completed it.
    async fn find_dispatch_target(
        &self,
        outbound_id: OutboundEventId,
    ) -> Result<Option<DispatchTarget>, Error>;

    /// Apply the outcome of a delivery attempt, bumping the attempt
    /// counter and `last_attempt_at` regardless of outcome.
    async fn complete_attempt(
        &self,
        outbound_id: OutboundEventId,
        outcome: AttemptOutcome,
    ) -> Result<(), Error>;
}
