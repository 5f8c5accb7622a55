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

//! Shared domain model and infrastructure abstractions for the chainhook
//! webhook notification pipeline: [`domain`] defines the event and
//! subscriber model, [`infra`] provides the durable [`infra::queue::EventQueue`]
//! and [`infra::store::SubscriberStore`] abstractions plus their concrete
//! backends, [`config`] is the shared figment-based configuration layer, and
//! [`telemetry`] wires up logging and metrics.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod telemetry;

pub use error::{BoxError, StdErrorExt};
