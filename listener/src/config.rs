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

use chainhook_common::config::QueueConfig;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub telemetry: chainhook_common::telemetry::Config,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: Url,
    pub rpc_user: String,
    pub rpc_pass: String,
    pub ca_cert_path: Option<String>,

    #[serde(default = "default_retry")]
    pub retry: u32,
}

fn default_retry() -> u32 {
    10
}

impl From<UpstreamConfig> for crate::infra::node::TransportConfig {
    fn from(config: UpstreamConfig) -> Self {
        Self {
            url: config.url,
            rpc_user: config.rpc_user,
            rpc_pass: config.rpc_pass,
            ca_cert_path: config.ca_cert_path,
            retry: config.retry,
        }
    }
}
