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

//! Redis-backed [`EventQueue`]. `reliable_pop` uses `BLMOVE` to move an
//! item from the main list to the in-flight list in one atomic step;
//! `ack` uses `LREM` with a count of `-1` to drop the most-recently-pushed
//! occurrence from the in-flight list's tail; `reclaim` drains the
//! in-flight list with non-blocking `LMOVE` calls onto the head of the
//! main list.

use super::{EventQueue, QueueName};
use crate::{config::QueueConfig, infra::queue::Error};
use fastrace::trace;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;

#[derive(Clone)]
pub struct RedisEventQueue {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisEventQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self, Error> {
        let client = Client::open(config.redis_url.as_str()).map_err(Error::new)?;
        let conn = client.get_connection_manager().await.map_err(Error::new)?;
        Ok(Self {
            conn,
            prefix: config.key_prefix.clone(),
        })
    }
}

impl EventQueue for RedisEventQueue {
    #[trace]
    async fn push(&self, queue: QueueName, item: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let key = queue.key(&self.prefix);
        conn.rpush::<_, _, ()>(&key, item).await.map_err(Error::new)
    }

    #[trace]
    async fn reliable_pop(
        &self,
        queue: QueueName,
        timeout: Duration,
    ) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let src = queue.key(&self.prefix);
        let dst = queue.inflight_key(&self.prefix);
        let item: Option<String> = conn
            .blmove(
                &src,
                &dst,
                redis::Direction::Left,
                redis::Direction::Right,
                timeout.as_secs_f64(),
            )
            .await
            .map_err(Error::new)?;
        Ok(item)
    }

    #[trace]
    async fn ack(&self, queue: QueueName, item: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let key = queue.inflight_key(&self.prefix);
        conn.lrem::<_, _, ()>(&key, -1, item).await.map_err(Error::new)
    }

    #[trace]
    async fn reclaim(&self, queue: QueueName) -> Result<u64, Error> {
        let mut conn = self.conn.clone();
        let src = queue.inflight_key(&self.prefix);
        let dst = queue.key(&self.prefix);
        let mut reclaimed = 0u64;
        loop {
            let item: Option<String> = conn
                .lmove(
                    &src,
                    &dst,
                    redis::Direction::Right,
                    redis::Direction::Left,
                )
                .await
                .map_err(Error::new)?;
            match item {
                Some(_) => reclaimed += 1,
                None => break,
            }
        }
        Ok(reclaimed)
    }

    #[trace]
    async fn inflight_len(&self, queue: QueueName) -> Result<u64, Error> {
        let mut conn = self.conn.clone();
        let key = queue.inflight_key(&self.prefix);
        conn.llen(&key).await.map_err(Error::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testcontainers::{ImageExt, runners::AsyncRunner};
    use testcontainers_modules::redis::Redis;

    async fn test_queue() -> (RedisEventQueue, testcontainers::ContainerAsync<Redis>) {
        let container = Redis::default()
            .with_tag("7-alpine")
            .start()
            .await
            .expect("start redis container");
        let port = container.get_host_port_ipv4(6379).await.unwrap();
        let config = QueueConfig {
            redis_url: format!("redis://127.0.0.1:{port}"),
            key_prefix: "test".into(),
        };
        let queue = RedisEventQueue::connect(&config).await.unwrap();
        (queue, container)
    }

    #[tokio::test]
    async fn reliable_pop_moves_item_to_inflight_until_acked() {
        let (queue, _container) = test_queue().await;

        queue.push(QueueName::Ingest, "item-1").await.unwrap();
        assert_eq!(queue.inflight_len(QueueName::Ingest).await.unwrap(), 0);

        let popped = queue
            .reliable_pop(QueueName::Ingest, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(popped.as_deref(), Some("item-1"));
        assert_eq!(queue.inflight_len(QueueName::Ingest).await.unwrap(), 1);

        queue.ack(QueueName::Ingest, "item-1").await.unwrap();
        assert_eq!(queue.inflight_len(QueueName::Ingest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reclaim_moves_unacked_items_back_to_the_main_queue() {
        let (queue, _container) = test_queue().await;

        queue.push(QueueName::Delivery, "token-1").await.unwrap();
        queue
            .reliable_pop(QueueName::Delivery, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(queue.inflight_len(QueueName::Delivery).await.unwrap(), 1);

        let reclaimed = queue.reclaim(QueueName::Delivery).await.unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(queue.inflight_len(QueueName::Delivery).await.unwrap(), 0);

        let popped = queue
            .reliable_pop(QueueName::Delivery, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(popped.as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn reliable_pop_times_out_on_empty_queue() {
        let (queue, _container) = test_queue().await;

        let popped = queue
            .reliable_pop(QueueName::Ingest, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(popped, None);
    }
}
