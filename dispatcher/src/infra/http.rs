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

//! HTTP delivery of a materialized webhook payload. One [`WebhookClient`]
//! is shared across every delivery attempt the process makes.

use fastrace::trace;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not build webhook HTTP client")]
pub struct Error(#[source] pub reqwest::Error);

/// The result of one delivery attempt. There is no "invalid" outcome here:
/// everything that is not a clean success is retryable by the dispatcher's
/// own policy, except a read timeout after the body was fully sent, which
/// the upstream subscriber is assumed to have received.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent,
    Retry { reason: String },
}

/// Posts a JSON payload to a subscriber's webhook URL with a bounded
/// connect and read timeout. `reqwest` does not expose a standalone
/// post-connect read timeout, so the connect and read budgets are
/// approximated as `connect_timeout` (the connection-establishment phase)
/// and an overall per-request timeout of `connect_timeout + read_timeout`.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .map_err(Error)?;

        Ok(Self { client })
    }

    #[trace]
    pub async fn deliver(&self, webhook: &str, payload: Vec<u8>) -> DeliveryOutcome {
        let result = self
            .client
            .post(webhook)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => DeliveryOutcome::Sent,
            Ok(response) => DeliveryOutcome::Retry {
                reason: format!("webhook responded with status {}", response.status()),
            },
            // A timeout that is not a connect timeout happened while
            // waiting for the response after the request body was fully
            // written; the subscriber is assumed to have received it.
            Err(error) if error.is_timeout() && !error.is_connect() => DeliveryOutcome::Sent,
            Err(error) => DeliveryOutcome::Retry {
                reason: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_status_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let client = WebhookClient::new(Duration::from_secs(3), Duration::from_secs(3)).unwrap();
        let outcome = client
            .deliver(&format!("{}/hook", server.url()), b"{}".to_vec())
            .await;

        mock.assert_async().await;
        assert!(matches!(outcome, DeliveryOutcome::Sent));
    }

    #[tokio::test]
    async fn non_2xx_status_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/hook").with_status(500).create_async().await;

        let client = WebhookClient::new(Duration::from_secs(3), Duration::from_secs(3)).unwrap();
        let outcome = client
            .deliver(&format!("{}/hook", server.url()), b"{}".to_vec())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Retry { .. }));
    }

    #[tokio::test]
    async fn connect_failure_is_retryable() {
        let client = WebhookClient::new(Duration::from_millis(200), Duration::from_secs(1)).unwrap();
        let outcome = client
            .deliver("http://127.0.0.1:1", b"{}".to_vec())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Retry { .. }));
    }
}
