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

//! Server-Sent-Events transport over `reqwest`.
//!
//! The decoder implements the `text/event-stream` framing incrementally:
//! chunks may split lines or events at arbitrary byte boundaries.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::{
    channel::{ChannelCommand, ChannelEvent, ChannelHandle, Transport, WireFrame},
    error::NetworkError,
};

/// One decoded server-sent event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event` field, if the server named the event.
    pub event: Option<String>,
    /// The accumulated `data` lines, joined with `\n`.
    pub data: String,
    /// The last seen `id` field.
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Creates a new empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes, returning every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.truncate(line.trim_end_matches(['\n', '\r']).len());
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Blank line terminates the event; dispatch only if data accrued.
            let event = self.event.take();
            let data = std::mem::take(&mut self.data);
            if data.is_empty() {
                return None;
            }
            return Some(SseEvent {
                event,
                data: data.join("\n"),
                id: self.id.clone(),
            });
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => {} // server-suggested reconnect delay; policy is ours
            other => tracing::trace!("ignoring SSE field `{other}`"),
        }
        None
    }
}

/// SSE implementation of [`Transport`].
///
/// The channel is receive-only: outbound `Text` commands are dropped with a
/// debug log, `Close` tears the stream down.
#[derive(Clone, Debug, Default)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// Creates a new [`SseTransport`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self, url: &str) -> Result<ChannelHandle, NetworkError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| NetworkError::Connect(e.to_string()))?;
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(NetworkError::Unauthorized { status });
        }
        if !response.status().is_success() {
            return Err(NetworkError::Http { status });
        }
        tracing::debug!("SSE stream opened: {url}");

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<ChannelCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut stream = response.bytes_stream();
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ChannelCommand::Close) | None => {
                            let _ = event_tx.send(ChannelEvent::Closed(None));
                            break;
                        }
                        Some(other) => {
                            tracing::debug!("dropping outbound command on receive-only SSE channel: {other:?}");
                        }
                    },
                    chunk = stream.next() => match chunk {
                        Some(Ok(bytes)) => {
                            for sse in decoder.feed(&bytes) {
                                let frame = WireFrame {
                                    event: sse.event,
                                    text: sse.data,
                                };
                                if event_tx.send(ChannelEvent::Frame(frame)).is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let _ = event_tx
                                .send(ChannelEvent::Closed(Some(NetworkError::Stream(e.to_string()))));
                            break;
                        }
                        None => {
                            let _ = event_tx.send(ChannelEvent::Closed(None));
                            break;
                        }
                    },
                }
            }
            tracing::trace!("SSE reader task finished");
        });

        Ok(ChannelHandle {
            commands: cmd_tx,
            events: event_rx,
        })
    }
}
