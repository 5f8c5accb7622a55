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

use chainhook_common::config::{QueueConfig, StoreConfig};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub store: StoreConfig,

    #[serde(default)]
    pub telemetry: chainhook_common::telemetry::Config,

    /// How long a reliable pop from the ingest queue blocks before
    /// retrying, i.e. the granularity at which the main loop notices a
    /// shutdown signal.
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub poll_timeout: Duration,
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(5)
}
