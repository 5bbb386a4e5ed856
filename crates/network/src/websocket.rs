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

//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Message, error::Error as WsError},
};

use crate::{
    channel::{ChannelCommand, ChannelEvent, ChannelHandle, Transport, WireFrame},
    error::NetworkError,
};

/// WebSocket implementation of [`Transport`].
///
/// Each opened session is driven by two tasks: a writer draining the outbound
/// command queue into the sink, and a reader forwarding inbound frames to the
/// event stream. Pings are answered through the same outbound queue, keeping
/// a single serialized send path.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates a new [`WebSocketTransport`] instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<ChannelHandle, NetworkError> {
        let (stream, _response) = match connect_async(url).await {
            Ok(ok) => ok,
            Err(WsError::Http(response)) => {
                let status = response.status().as_u16();
                return Err(if status == 401 || status == 403 {
                    NetworkError::Unauthorized { status }
                } else {
                    NetworkError::Http { status }
                });
            }
            Err(WsError::Url(e)) => return Err(NetworkError::Url(e.to_string())),
            Err(e) => return Err(NetworkError::Connect(e.to_string())),
        };
        tracing::debug!("WebSocket handshake complete: {url}");

        let (mut sink, mut source) = stream.split();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ChannelCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let outcome = match cmd {
                    ChannelCommand::Text(text) => sink.send(Message::text(text)).await,
                    ChannelCommand::Pong(payload) => sink.send(Message::Pong(payload)).await,
                    ChannelCommand::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = outcome {
                    // The reader observes the closure and reports it.
                    tracing::debug!("WebSocket send failed: {e}");
                    break;
                }
            }
            tracing::trace!("WebSocket writer task finished");
        });

        let pong_tx = cmd_tx.clone();
        tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx
                            .send(ChannelEvent::Frame(WireFrame::text(text.to_string())))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = pong_tx.send(ChannelCommand::Pong(payload));
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("WebSocket closed by remote: {frame:?}");
                        let _ = event_tx.send(ChannelEvent::Closed(None));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx
                            .send(ChannelEvent::Closed(Some(NetworkError::Stream(e.to_string()))));
                        break;
                    }
                    None => {
                        let _ = event_tx.send(ChannelEvent::Closed(None));
                        break;
                    }
                }
            }
            tracing::trace!("WebSocket reader task finished");
        });

        Ok(ChannelHandle {
            commands: cmd_tx,
            events: event_rx,
        })
    }
}
