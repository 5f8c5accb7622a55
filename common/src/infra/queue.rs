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

//! The reliable work queue abstraction shared by the listener, processor
//! and dispatcher. An item survives a consumer crash between pop and ack:
//! a reliable pop moves the item atomically into a per-queue "in flight"
//! list rather than discarding it, and [`EventQueue::reclaim`] moves
//! anything left behind by a dead consumer back onto the head of the main
//! list on the next process's startup.

pub mod redis;

use crate::{BoxError, StdErrorExt};
use std::time::Duration;
use thiserror::Error;

/// The two durable queues in the pipeline: raw normalized events from the
/// listener to the processor, and delivery tokens from the processor to
/// the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Ingest,
    Delivery,
}

impl QueueName {
    /// The main list key, namespaced under the configured prefix:
    /// `<prefix>:evt` for the ingest queue, `<prefix>:send` for the
    /// delivery queue.
    pub fn key(self, prefix: &str) -> String {
        match self {
            QueueName::Ingest => format!("{prefix}:evt"),
            QueueName::Delivery => format!("{prefix}:send"),
        }
    }

    /// The in-flight list key an item is moved to between reliable pop and
    /// ack, suffixed `:t`.
    pub fn inflight_key(self, prefix: &str) -> String {
        format!("{}:t", self.key(prefix))
    }
}

#[derive(Debug, Error)]
#[error("event queue operation failed")]
pub struct Error(#[source] pub BoxError);

impl Error {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(source.into_box())
    }
}

/// A durable, at-least-once work queue. Implementations must make
/// `reliable_pop` atomic with the corresponding in-flight enqueue: a crash
/// between the two is not possible, only a crash after pop and before
/// [`EventQueue::ack`], which [`EventQueue::reclaim`] recovers from.
#[trait_variant::make(Send)]
pub trait EventQueue {
    /// Push a new item onto the tail of `queue`.
    async fn push(&self, queue: QueueName, item: &str) -> Result<(), Error>;

    /// Block for up to `timeout` waiting for an item, moving it atomically
    /// into the in-flight list on success. Returns `None` on timeout.
    async fn reliable_pop(&self, queue: QueueName, timeout: Duration) -> Result<Option<String>, Error>;

    /// Remove one occurrence of `item` from the in-flight list, marking it
    /// durably delivered.
    async fn ack(&self, queue: QueueName, item: &str) -> Result<(), Error>;

    /// Move every item left in the in-flight list back onto the head of
    /// `queue`, in order. Called once at startup before a consumer begins
    /// popping, to recover items an earlier crashed instance left
    /// in-flight. Returns the number of items reclaimed.
    async fn reclaim(&self, queue: QueueName) -> Result<u64, Error>;

    /// The current length of `queue`'s in-flight list, exposed as a
    /// backlog metric.
    async fn inflight_len(&self, queue: QueueName) -> Result<u64, Error>;
}
