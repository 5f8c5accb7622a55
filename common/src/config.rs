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

//! Layered configuration loading shared by all three binaries: a YAML file
//! (path given on the command line or defaulted to `config.yaml`) overridden
//! by `APP_`-prefixed environment variables, e.g. `APP_QUEUE__REDIS_URL`.

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, de::DeserializeOwned};
use std::path::Path;

/// Blanket extension implemented for every binary's top-level `Config`.
pub trait ConfigExt: DeserializeOwned {
    /// Load configuration by merging a YAML file with `APP_`-prefixed
    /// environment variables (the latter taking precedence).
    fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()
    }
}

impl<T> ConfigExt for T where T: DeserializeOwned {}

/// Connection settings for the durable [`crate::infra::queue::EventQueue`],
/// shared by the Listener (writer), Processor (reader/writer) and
/// Dispatcher (reader).
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// e.g. `redis://localhost:6379`.
    pub redis_url: String,

    /// Key prefix for both queues, defaults to `chk` (see
    /// [`crate::infra::queue::QueueName`]).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "chk".to_owned()
}

/// Connection settings for the [`crate::infra::store::SubscriberStore`].
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_required_key_is_a_fatal_load_error() {
        let mut empty = tempfile::NamedTempFile::new().unwrap();
        writeln!(empty, "{{}}").unwrap();

        // `database_url` has no default, unlike `max_connections`.
        let result = StoreConfig::load(empty.path());
        assert!(result.is_err());
    }

    #[test]
    fn defaults_apply_when_keys_are_omitted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "redis_url: redis://localhost:6379").unwrap();

        let config = QueueConfig::load(file.path()).unwrap();
        assert_eq!(config.key_prefix, "chk");
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "redis_url: redis://localhost:6379").unwrap();

        // SAFETY: this test does not run concurrently with other tests that
        // read this variable.
        unsafe {
            std::env::set_var("APP_REDIS_URL", "redis://override:6380");
        }
        let config = QueueConfig::load(file.path()).unwrap();
        unsafe {
            std::env::remove_var("APP_REDIS_URL");
        }

        assert_eq!(config.redis_url, "redis://override:6380");
    }
}
