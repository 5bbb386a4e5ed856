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

//! Configuration for the connection manager and push adapter.

use ahash::AHashSet;
use serde_json::Value;
use tidelink_network::{
    ReconnectPolicy, frame::OutboundControl, heartbeat::DEFAULT_HEARTBEAT_INTERVAL_MS,
};

use crate::{credential::CredentialKind, events::MessageCategory};

/// Per-connect options.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Extra query parameters appended to the URL. Parameters the URL
    /// already carries are left untouched.
    pub params: Vec<(String, String)>,
    /// Which credential to embed in the URL, if any. The credential is
    /// re-read on every reconnect attempt, so a rotated token is picked up
    /// automatically.
    pub credential: Option<CredentialKind>,
    /// Optional identify payload sent as the first frame after each open
    /// (wire type `1`).
    pub identify: Option<Value>,
}

/// Configuration for [`ConnectionManager`](crate::manager::ConnectionManager).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// The reconnect delay policy shared by all managed connections.
    pub reconnect: ReconnectPolicy,
    /// The keep-alive interval (milliseconds).
    pub heartbeat_interval_ms: u64,
    /// The keep-alive wire payload.
    pub heartbeat_payload: String,
    /// Categories discarded entirely while a connection's delivery is
    /// paused. All other categories keep flowing.
    pub suppressible: AHashSet<MessageCategory>,
    /// Categories that raise an OS-level notification when the owning
    /// surface is blurred.
    pub notifiable: AHashSet<MessageCategory>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::exponential(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            heartbeat_payload: OutboundControl::heartbeat().to_json(),
            suppressible: [MessageCategory::Chat].into_iter().collect(),
            notifiable: [MessageCategory::Chat, MessageCategory::Notice]
                .into_iter()
                .collect(),
        }
    }
}

/// Configuration for [`PushChannel`](crate::push::PushChannel).
#[derive(Clone, Debug)]
pub struct PushConfig {
    /// Base URL of the push service (REST handshake and stream).
    pub base_url: String,
    /// The connection id the adapter dispatches under.
    pub connection_id: String,
    /// Topic names subscribed after the stream reports its client id.
    pub topics: Vec<String>,
    /// The reconnect delay policy for stream-level failures. The attempt
    /// counter is independent of the WebSocket registry.
    pub reconnect: ReconnectPolicy,
}

impl PushConfig {
    /// Creates a config for the given service base URL with default topics.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connection_id: "push".to_string(),
            topics: vec![
                "users".to_string(),
                "wallets".to_string(),
                "stick".to_string(),
            ],
            reconnect: ReconnectPolicy::exponential(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn manager_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.heartbeat_interval_ms, 25_000);
        assert_eq!(config.heartbeat_payload, r#"{"type":4}"#);
        assert!(config.suppressible.contains(&MessageCategory::Chat));
        assert!(!config.suppressible.contains(&MessageCategory::Wallet));
    }

    #[rstest]
    fn push_defaults() {
        let config = PushConfig::new("https://push.example.com");
        assert_eq!(config.connection_id, "push");
        assert_eq!(config.topics, vec!["users", "wallets", "stick"]);
    }
}
