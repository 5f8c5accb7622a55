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
    infra::{queue::redis::RedisEventQueue, store::postgres::PostgresSubscriberStore},
    telemetry,
};
use chainhook_processor::{application, config::Config};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

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
    let store = PostgresSubscriberStore::new(pool);

    application::run(queue, store, config.poll_timeout, sigterm).await
}
