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

//! Typed message events and categories.

use serde_json::Value;
use strum::Display;

use crate::registry::ConnectionId;

/// Dispatcher event kinds (typed replacement for stringly event names).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    /// An inbound application message was dispatched.
    Message,
    /// A connection finished its handshake.
    Connected,
    /// A connection closed (any cause).
    Closed,
}

/// Coarse message categories used for routing, suppression and notification.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum MessageCategory {
    /// Transient chat-room traffic (messages, barrages, revokes).
    Chat,
    /// Room presence: online users, topic changes.
    Presence,
    /// Account notifications.
    Notice,
    /// Wallet/balance updates pushed by the server.
    Wallet,
    /// Long-running game event stream.
    Game,
    /// Transport/session control frames.
    Control,
    /// Anything not recognized.
    Unknown,
}

impl MessageCategory {
    /// Classifies a wire-level type or SSE event name.
    #[must_use]
    pub fn classify(kind: &str) -> Self {
        match kind {
            "msg" | "chat" | "barrager" | "revoke" | "redPacketStatus" | "customMessage" => {
                Self::Chat
            }
            "online" | "discussChanged" | "users" => Self::Presence,
            "notice" | "notification" => Self::Notice,
            "wallets" | "wallet" => Self::Wallet,
            "stick" | "game" => Self::Game,
            "PB_CONNECT" | "1" | "4" => Self::Control,
            _ => Self::Unknown,
        }
    }
}

/// A parsed, classified inbound message as delivered to handlers.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// The connection the message arrived on.
    pub connection_id: ConnectionId,
    /// The raw wire type or SSE event name.
    pub kind: String,
    /// The category the kind classifies into.
    pub category: MessageCategory,
    /// The full parsed JSON payload.
    pub payload: Value,
}

impl InboundMessage {
    /// Returns the `data` field of the payload, if present.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}
