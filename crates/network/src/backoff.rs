// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Reconnect delay policy.
//!
//! The policy is a pure function of the attempt count: identical inputs always
//! yield identical outputs, so reconnect scheduling can be asserted in tests
//! without real timers. Attempt bookkeeping itself belongs to the connection
//! registry; this type only answers "how long" and "whether at all".

use std::time::Duration;

/// The default initial reconnect delay (milliseconds).
pub const DEFAULT_DELAY_INITIAL_MS: u64 = 1_000;
/// The default reconnect delay ceiling (milliseconds).
pub const DEFAULT_DELAY_MAX_MS: u64 = 10_000;
/// The default maximum number of automatic reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How the delay grows with consecutive failed attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffKind {
    /// Delay doubles per attempt, capped at the configured ceiling.
    Exponential,
    /// Delay is the initial value for every attempt.
    Fixed,
}

/// Computes reconnect delays and the retry ceiling for a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// The initial delay (milliseconds) before the first reconnect attempt.
    pub delay_initial_ms: u64,
    /// The delay ceiling (milliseconds) for exponential growth.
    pub delay_max_ms: u64,
    /// The maximum number of automatic attempts before giving up.
    pub max_attempts: u32,
    /// The growth curve applied per attempt.
    pub kind: BackoffKind,
}

impl ReconnectPolicy {
    /// Creates an exponential policy with the default delays and ceiling.
    #[must_use]
    pub const fn exponential() -> Self {
        Self {
            delay_initial_ms: DEFAULT_DELAY_INITIAL_MS,
            delay_max_ms: DEFAULT_DELAY_MAX_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            kind: BackoffKind::Exponential,
        }
    }

    /// Creates a fixed-delay policy (every attempt waits `delay_ms`).
    #[must_use]
    pub const fn fixed(delay_ms: u64) -> Self {
        Self {
            delay_initial_ms: delay_ms,
            delay_max_ms: delay_ms,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            kind: BackoffKind::Fixed,
        }
    }

    /// Returns a copy of this policy with a different attempt ceiling.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the delay to wait before the reconnect attempt following
    /// `attempts` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let ms = match self.kind {
            BackoffKind::Fixed => self.delay_initial_ms,
            BackoffKind::Exponential => {
                // Clamp the shift so large attempt counts saturate at the cap.
                let shift = attempts.min(31);
                self.delay_initial_ms
                    .saturating_mul(1_u64 << shift)
                    .min(self.delay_max_ms)
            }
        };
        Duration::from_millis(ms)
    }

    /// Returns `true` if another automatic attempt is permitted after
    /// `attempts` consecutive failures.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}
