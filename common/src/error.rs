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

/// A type-erased error, used at module boundaries where the concrete error
/// type of an inner dependency would otherwise leak into a public API.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Extension for attaching ad-hoc context to a [`std::error::Error`] without
/// pulling in `anyhow` at every call site.
pub trait StdErrorExt {
    fn into_box(self) -> BoxError;
}

impl<E> StdErrorExt for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_box(self) -> BoxError {
        Box::new(self)
    }
}
