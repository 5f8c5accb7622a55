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

use crate::domain::ids::{Address, OutboundEventId, SubscriberId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What a subscriber is registered to receive. Exactly one active relation
/// per (subscriber, subscription-key) pair exists at any time; enforced by
/// the store's schema, not by this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    Address(Address),
    NewBlock,
    DiscBlock,
}

/// A subscriber matched against a raw event, as returned by the
/// [`crate::infra::store::SubscriberStore`] queries. `address` is `Some` only
/// for address-kind matches, since a subscriber may watch more than one
/// address and each match is reported separately: a subscriber watching
/// two matching addresses produces two outbound records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedSubscriber {
    pub subscriber_id: SubscriberId,
    pub webhook: String,
    pub address: Option<Address>,
}

/// Delivery lifecycle of an outbound event record. `Pending` and
/// `Retrying` are both dispatchable; `Sent` and `GaveUp` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum OutboundStatus {
    Pending,
    Sent,
    Retrying,
    GaveUp,
}

impl OutboundStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OutboundStatus::Sent | OutboundStatus::GaveUp)
    }
}

/// A durable record of one intended delivery to one subscriber, created by
/// the Processor and mutated only by the Dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub id: OutboundEventId,
    pub subscriber_id: SubscriberId,
    pub payload: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub attempts: u32,
    pub last_attempt_at: Option<OffsetDateTime>,
    pub status: Option<OutboundStatus>,
}

/// An outbound row awaiting insertion, produced by the Processor in one
/// transaction per raw event.
#[derive(Debug, Clone)]
pub struct NewOutboundEvent {
    pub subscriber_id: SubscriberId,
    pub payload: Vec<u8>,
}

/// The webhook, payload and current attempt count for an outbound row the
/// Dispatcher has looked up for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub outbound_id: OutboundEventId,
    pub webhook: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
    pub created_at: OffsetDateTime,
}
