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

//! Connection registry and lifecycle state machine.
//!
//! The registry is the single source of truth for connection state. Every
//! transition decision — admit a connect, schedule a retry after a delay,
//! give up, drop the entry — is computed synchronously here, so the whole
//! lifecycle is unit-testable without transports or timers. The manager is
//! the only component that mutates it.

use std::{fmt, time::Duration};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use strum::Display;
use tidelink_network::ReconnectPolicy;
use ustr::Ustr;

use crate::{config::ConnectOptions, error::ClientError};

/// Identifies one managed connection.
///
/// Callers supply an id on connect; by convention it defaults to the target
/// URL when the caller has no better name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Ustr);

impl ConnectionId {
    /// Creates a connection id from the given value.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(Ustr::from(value))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the interned key backing this id.
    #[must_use]
    pub const fn as_ustr(&self) -> Ustr {
        self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Lifecycle states of a managed connection.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectionState {
    /// Registered but no attempt made yet.
    Idle,
    /// A transport handshake is in flight.
    Connecting,
    /// The transport session is live.
    Open,
    /// An orderly teardown is in progress.
    Closing,
    /// No live transport; terminal unless a retry is pending or the caller
    /// reconnects manually.
    Closed,
    /// Closed without caller intent; a reconnect timer is pending.
    ReconnectPending,
}

/// A handle to one live or pending transport session.
#[derive(Clone, Debug)]
pub struct Connection {
    /// The unique key for this connection.
    pub id: ConnectionId,
    /// The caller-supplied address, before credential resolution.
    pub source_url: String,
    /// The resolved wire address of the last attempt, credential-embedded.
    pub url: String,
    /// The options supplied at connect time, reused on every reattempt.
    pub options: ConnectOptions,
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Consecutive failed reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Whether the closure was caller-initiated.
    pub manual_close: bool,
    /// When the registry entry was created.
    pub created_at: DateTime<Utc>,
}

/// Point-in-time status snapshot for callers polling a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Consecutive failed reconnect attempts.
    pub reconnect_attempts: u32,
}

/// Outcome of admitting a connect call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectAdmission {
    /// An open session already exists for this id; reuse it.
    AlreadyOpen,
    /// The attempt may proceed; the record is now `Connecting`.
    Admitted,
}

/// What to do after a connection closed or failed to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClosedDisposition {
    /// Caller-initiated close; the entry was removed after teardown.
    Removed,
    /// Schedule reconnect attempt `next_attempt` after `delay`.
    Retry {
        /// The attempt number the pending timer will start (1-based).
        next_attempt: u32,
        /// How long to wait before the attempt.
        delay: Duration,
    },
    /// The retry budget is spent; the entry stays `Closed` for inspection.
    Exhausted,
}

/// Owns every connection record and its derived backoff state.
#[derive(Debug)]
pub struct ConnectionRegistry {
    policy: ReconnectPolicy,
    records: AHashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    /// Creates an empty registry driven by the given reconnect policy.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            records: AHashMap::new(),
        }
    }

    /// Returns the reconnect policy in force.
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Admits or rejects a connect call for `id`.
    ///
    /// A `Connecting` record rejects the duplicate; an `Open` record
    /// short-circuits; anything else (including a previously exhausted
    /// `Closed` record) is re-admitted with its attempt counter reset.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyConnecting`] when an attempt for `id`
    /// is still in flight.
    pub fn begin_connect(
        &mut self,
        id: ConnectionId,
        source_url: &str,
        options: ConnectOptions,
    ) -> Result<ConnectAdmission, ClientError> {
        if let Some(record) = self.records.get_mut(&id) {
            return match record.state {
                ConnectionState::Connecting => Err(ClientError::AlreadyConnecting(id)),
                ConnectionState::Open => Ok(ConnectAdmission::AlreadyOpen),
                _ => {
                    record.state = ConnectionState::Connecting;
                    record.reconnect_attempts = 0;
                    record.manual_close = false;
                    record.source_url = source_url.to_string();
                    record.options = options;
                    Ok(ConnectAdmission::Admitted)
                }
            };
        }
        self.records.insert(
            id,
            Connection {
                id,
                source_url: source_url.to_string(),
                url: source_url.to_string(),
                options,
                state: ConnectionState::Connecting,
                reconnect_attempts: 0,
                manual_close: false,
                created_at: Utc::now(),
            },
        );
        Ok(ConnectAdmission::Admitted)
    }

    /// Records the resolved wire address of the current attempt.
    pub fn set_resolved_url(&mut self, id: &ConnectionId, url: String) {
        if let Some(record) = self.records.get_mut(id) {
            record.url = url;
        }
    }

    /// Marks a handshake as succeeded.
    ///
    /// Returns `false` when the record is gone or was manually closed while
    /// the handshake was in flight, in which case the caller must tear the
    /// fresh session down.
    pub fn opened(&mut self, id: &ConnectionId) -> bool {
        match self.records.get_mut(id) {
            Some(record) if !record.manual_close => {
                record.state = ConnectionState::Open;
                record.reconnect_attempts = 0;
                true
            }
            _ => false,
        }
    }

    /// Handles a handshake failure for `id`.
    pub fn connect_failed(&mut self, id: &ConnectionId) -> ClosedDisposition {
        self.on_closed(id)
    }

    /// Handles a transport-level closure for `id`.
    pub fn remote_closed(&mut self, id: &ConnectionId) -> ClosedDisposition {
        self.on_closed(id)
    }

    fn on_closed(&mut self, id: &ConnectionId) -> ClosedDisposition {
        let Some(record) = self.records.get_mut(id) else {
            return ClosedDisposition::Removed;
        };
        if record.manual_close {
            self.records.remove(id);
            return ClosedDisposition::Removed;
        }
        let attempts = record.reconnect_attempts;
        if self.policy.should_retry(attempts) {
            record.state = ConnectionState::ReconnectPending;
            ClosedDisposition::Retry {
                next_attempt: attempts + 1,
                delay: self.policy.delay_for(attempts),
            }
        } else {
            record.state = ConnectionState::Closed;
            ClosedDisposition::Exhausted
        }
    }

    /// Takes the `ReconnectPending → Connecting` edge for `id`.
    ///
    /// Returns the attempt number now in flight, or `None` when the pending
    /// retry was cancelled (manual close, removal, or a state change).
    pub fn begin_reconnect(&mut self, id: &ConnectionId) -> Option<u32> {
        let record = self.records.get_mut(id)?;
        if record.state != ConnectionState::ReconnectPending || record.manual_close {
            return None;
        }
        record.reconnect_attempts += 1;
        record.state = ConnectionState::Connecting;
        Some(record.reconnect_attempts)
    }

    /// Leaves the record in terminal `Closed` without scheduling retries.
    ///
    /// Used when a credential is missing or rejected: retrying with the same
    /// credential cannot succeed.
    pub fn abandon(&mut self, id: &ConnectionId) {
        if let Some(record) = self.records.get_mut(id) {
            record.state = ConnectionState::Closed;
        }
    }

    /// Flags `id` as caller-closed. Returns `true` when the record existed.
    pub fn mark_manual_close(&mut self, id: &ConnectionId) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.manual_close = true;
                if record.state == ConnectionState::Open {
                    record.state = ConnectionState::Closing;
                }
                true
            }
            None => false,
        }
    }

    /// Removes the record for `id`, if present.
    pub fn remove(&mut self, id: &ConnectionId) {
        self.records.remove(id);
    }

    /// Returns the status snapshot for `id`.
    #[must_use]
    pub fn status(&self, id: &ConnectionId) -> Option<ConnectionStatus> {
        self.records.get(id).map(|record| ConnectionStatus {
            state: record.state,
            reconnect_attempts: record.reconnect_attempts,
        })
    }

    /// Returns a clone of the full record for `id`.
    #[must_use]
    pub fn snapshot(&self, id: &ConnectionId) -> Option<Connection> {
        self.records.get(id).cloned()
    }

    /// Returns every registered connection id.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.records.keys().copied().collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(ReconnectPolicy::exponential())
    }
}
