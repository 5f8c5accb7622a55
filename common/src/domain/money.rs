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

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// An amount of the chain's base currency unit, represented as an integer
/// count of its smallest subdivision ("satoshi").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Satoshis(pub i64);

impl Satoshis {
    /// Convert a decimal amount, as delivered by the upstream node (a
    /// floating-point number of whole coins), to an integer satoshi count:
    /// `⌊value·10^8⌋`.
    ///
    /// The upstream value is already quantized to 8 decimal places, so a
    /// literal `(value * 1e8).floor()` would occasionally truncate one
    /// satoshi short of the intended amount when the multiplication lands a
    /// hair below the true integer due to binary floating point
    /// representation error. Nudging by a sub-satoshi epsilon before
    /// flooring corrects that without changing the floor semantics (see
    /// DESIGN.md).
    pub fn from_btc(value: f64) -> Self {
        Self((value * 1e8 + 1e-6).floor() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_btc_converts_whole_and_fractional_amounts() {
        assert_eq!(Satoshis::from_btc(1.0), Satoshis(100_000_000));
        assert_eq!(Satoshis::from_btc(0.00000001), Satoshis(1));
        assert_eq!(Satoshis::from_btc(1.5), Satoshis(150_000_000));
        assert_eq!(Satoshis::from_btc(0.25), Satoshis(25_000_000));
    }

    #[test]
    fn from_btc_avoids_binary_float_drift() {
        // 0.1 + 0.2 style classic case: 29.99999999 is meant to be 30 exactly.
        assert_eq!(Satoshis::from_btc(0.1), Satoshis(10_000_000));
    }

    #[test]
    fn from_btc_truncates_rather_than_rounds() {
        // 1 satoshi short of the next whole satoshi must floor down, not
        // round up, per the documented ⌊value·10^8⌋ invariant.
        assert_eq!(Satoshis::from_btc(0.000000014), Satoshis(1));
        assert_eq!(Satoshis::from_btc(0.000000019), Satoshis(1));
    }
}
