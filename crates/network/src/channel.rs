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

//! The polymorphic transport seam.
//!
//! A [`Transport`] opens one wire session and hands back a [`ChannelHandle`]:
//! an inbound event stream plus a single serialized outbound command path.
//! The WebSocket and SSE variants differ only in handshake and frame
//! encoding; everything above this seam (registry, reconnection, dispatch)
//! is shared.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::NetworkError;

/// One unit of inbound traffic from a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFrame {
    /// Transport-level event name (SSE event field); `None` for WebSocket
    /// text frames.
    pub event: Option<String>,
    /// The raw frame text.
    pub text: String,
}

impl WireFrame {
    /// Creates a plain text frame with no transport-level event name.
    #[must_use]
    pub const fn text(text: String) -> Self {
        Self { event: None, text }
    }

    /// Creates a named-event frame (SSE).
    #[must_use]
    pub const fn event(event: String, text: String) -> Self {
        Self {
            event: Some(event),
            text,
        }
    }
}

/// Events reported by an open channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A frame arrived on the wire.
    Frame(WireFrame),
    /// The session ended; `None` for an orderly close.
    Closed(Option<NetworkError>),
}

/// Commands accepted by an open channel's outbound path.
///
/// Heartbeats and application sends travel through the same queue, so they
/// never interleave out of order on the wire.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Send a text frame.
    Text(String),
    /// Reply to a transport-level ping.
    Pong(Bytes),
    /// Close the session.
    Close,
}

/// A handle to one open wire session.
#[derive(Debug)]
pub struct ChannelHandle {
    /// The serialized outbound command path.
    pub commands: mpsc::UnboundedSender<ChannelCommand>,
    /// Inbound events, in wire-arrival order.
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// A transport able to open wire sessions.
///
/// Opening resolves once the transport-level handshake completes; handshake
/// failures (including credential rejections, surfaced as
/// [`NetworkError::Unauthorized`]) are returned directly rather than through
/// the event stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a session against `url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the handshake cannot be completed.
    async fn open(&self, url: &str) -> Result<ChannelHandle, NetworkError>;
}
