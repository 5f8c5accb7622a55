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

use anyhow::Context;
use chainhook_common::{
    config::ConfigExt,
    infra::{
        queue::redis::RedisEventQueue,
        store::postgres::{try_acquire_singleton_lock, PostgresSubscriberStore},
    },
    telemetry,
};
use chainhook_dispatcher::{
    application::{self, RetryBudget},
    config::Config,
    infra::http::WebhookClient,
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::{
    hash::{Hash, Hasher},
    path::PathBuf,
};

#[derive(Parser)]
struct Args {
    #[arg(long, env = "APP_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_logging();
    telemetry::init_panic_logging();

    let args = Args::parse();
    let config = Config::load(&args.config).context("load configuration")?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    telemetry::init_metrics(config.telemetry.metrics_config.clone());

    let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("install SIGTERM handler")?;

    let queue = RedisEventQueue::connect(&config.queue)
        .await
        .context("connect to event queue")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.store.max_connections)
        .connect(&config.store.database_url)
        .await
        .context("connect to subscriber store")?;
    sqlx::migrate!("../common/migrations/postgres")
        .run(&pool)
        .await
        .context("run database migrations")?;

    // Running more than one dispatcher against the same delivery queue
    // duplicates deliveries, because one instance's reclaim sweep can hand
    // an in-flight token to the other. Enforce it here instead of leaving
    // it a documentation-only assumption. The guard connection must be
    // held for as long as the dispatcher runs: the advisory lock it holds
    // is scoped to that connection's session, not to this call.
    let lock_key = advisory_lock_key(&config.queue.key_prefix);
    let _singleton_lock = try_acquire_singleton_lock(&pool, lock_key)
        .await
        .context("acquire dispatcher singleton lock")?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "another dispatcher instance already holds the singleton lock for queue prefix {:?}",
                config.queue.key_prefix
            )
        })?;

    let store = PostgresSubscriberStore::new(pool);
    let http = WebhookClient::new(config.connect_timeout, config.read_timeout)
        .context("build webhook HTTP client")?;
    let retry_budget = RetryBudget {
        max_attempts: config.max_attempts,
        max_age: config.max_age,
    };

    application::run(queue, store, http, retry_budget, sigterm).await
}

/// Derive a stable `bigint` advisory lock key from the queue prefix, so
/// two dispatchers configured against different prefixes never contend
/// for the same lock.
fn advisory_lock_key(prefix: &str) -> i64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    prefix.hash(&mut hasher);
    hasher.finish() as i64
}
