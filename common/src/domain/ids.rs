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

use derive_more::{AsRef, Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A block hash, hex-encoded by the upstream node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, AsRef, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(pub String);

/// A transaction id, hex-encoded by the upstream node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, AsRef, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

/// A chain address, in whatever string encoding the upstream node uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, AsRef, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

/// A subscriber's opaque public identifier, handed out at registration time
/// and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SubscriberId(pub Uuid);

/// The primary key of an [`crate::domain::subscriber::OutboundEvent`] row,
/// monotonic within the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OutboundEventId(pub i64);
