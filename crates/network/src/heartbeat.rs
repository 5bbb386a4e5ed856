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

//! Per-connection keep-alive scheduler.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use ustr::Ustr;

use crate::channel::ChannelCommand;

/// The default keep-alive interval (milliseconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 25_000;

/// Arms one recurring keep-alive timer per connection.
///
/// Re-arming an already-armed key cancels the previous timer first, so there
/// is never more than one timer per connection. Send failures are ignored:
/// a heartbeat hitting a closed channel is superseded by the close/reconnect
/// path.
#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    timers: DashMap<Ustr, tokio::task::JoinHandle<()>>,
}

impl HeartbeatScheduler {
    /// Creates a new empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the keep-alive timer for `key`.
    ///
    /// `payload` is sent through `commands` every `interval` for as long as
    /// the timer stays armed and the channel stays open.
    pub fn start(
        &self,
        key: Ustr,
        commands: mpsc::UnboundedSender<ChannelCommand>,
        payload: String,
        interval: Duration,
    ) {
        if let Some((_, previous)) = self.timers.remove(&key) {
            previous.abort();
        }
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the heartbeat cadence
            // starts one full interval after the connection opens.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracing::trace!("heartbeat tick: {key}");
                if commands.send(ChannelCommand::Text(payload.clone())).is_err() {
                    break;
                }
            }
        });
        self.timers.insert(key, handle);
    }

    /// Cancels the keep-alive timer for `key`, if armed.
    pub fn stop(&self, key: &Ustr) {
        if let Some((_, handle)) = self.timers.remove(key) {
            handle.abort();
        }
    }

    /// Cancels every armed timer.
    pub fn stop_all(&self) {
        let keys: Vec<Ustr> = self.timers.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.stop(&key);
        }
    }

    /// Returns `true` if a timer is armed for `key`.
    #[must_use]
    pub fn is_armed(&self, key: &Ustr) -> bool {
        self.timers.contains_key(key)
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}
