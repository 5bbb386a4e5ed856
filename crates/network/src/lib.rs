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

//! Transport-level plumbing for real-time client connections.
//!
//! This crate provides the pieces of the connection stack that carry no
//! application semantics:
//!
//! - [`backoff`] — pure reconnect delay policy (exponential or fixed).
//! - [`channel`] — the polymorphic transport seam: a [`Transport`](channel::Transport)
//!   opens a wire session and yields a [`ChannelHandle`](channel::ChannelHandle)
//!   of inbound events plus a serialized outbound command path.
//! - [`websocket`] — WebSocket implementation over `tokio-tungstenite`.
//! - [`sse`] — Server-Sent-Events implementation over `reqwest`, including an
//!   incremental `text/event-stream` decoder.
//! - [`heartbeat`] — per-connection keep-alive scheduler.
//! - [`frame`] — JSON wire frame codec for outbound control frames.
//!
//! Reconnection and dispatch live a level up (in `tidelink-client`); the
//! transports here only report that a session opened, produced a frame, or
//! closed.

pub mod backoff;
pub mod channel;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod sse;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use channel::{ChannelCommand, ChannelEvent, ChannelHandle, Transport, WireFrame};
pub use error::NetworkError;
pub use heartbeat::HeartbeatScheduler;
pub use sse::{SseDecoder, SseEvent, SseTransport};
pub use websocket::WebSocketTransport;
