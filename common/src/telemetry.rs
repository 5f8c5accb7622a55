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

//! Logging and metrics setup shared by all three binaries.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metrics_config: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: IpAddr,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 9000,
        }
    }
}

/// Initialize the `log` facade with a `logforth` backend. Call once at the
/// very start of `main`.
pub fn init_logging() {
    logforth::starter_log::build().apply();
}

/// Start the Prometheus metrics exporter if enabled. A no-op (metrics calls
/// elsewhere simply become inert) when disabled, so telemetry is optional
/// rather than mandatory for any of the three binaries.
pub fn init_metrics(config: MetricsConfig) {
    if !config.enabled {
        return;
    }

    let address = SocketAddr::new(config.address, config.port);

    if let Err(error) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
    {
        log::error!(error:%; "failed to install prometheus metrics exporter");
    }
}

/// Install a panic hook that logs the panic payload before the default hook
/// runs, so a panic is never silent in the process log.
pub fn init_panic_logging() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        log::error!(panic:% = panic; "process panicked");
        default_hook(panic);
    }));
}
