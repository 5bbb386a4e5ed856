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

//! Scripted transport and recording sink shared by the integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tidelink_client::notifier::{Notification, NotificationId, NotificationSink};
use tidelink_network::{ChannelCommand, ChannelEvent, ChannelHandle, NetworkError, Transport, WireFrame};
use tokio::sync::mpsc;

/// What the next `open()` call should do.
#[derive(Clone, Copy, Debug)]
pub enum Scripted {
    /// Succeed and hand the test a controllable session.
    Open,
    /// Fail with a transport-level error.
    Fail,
    /// Fail with an HTTP 401.
    FailAuth,
    /// Never resolve (handshake in flight forever).
    Hang,
}

/// One successfully opened scripted session.
pub struct Session {
    pub url: String,
    pub opened_at: tokio::time::Instant,
    pub events: mpsc::UnboundedSender<ChannelEvent>,
    pub commands: Mutex<mpsc::UnboundedReceiver<ChannelCommand>>,
}

impl Session {
    /// Pushes an inbound text frame.
    pub fn frame(&self, text: &str) {
        let _ = self
            .events
            .send(ChannelEvent::Frame(WireFrame::text(text.to_string())));
    }

    /// Pushes an inbound named-event frame (SSE shape).
    pub fn event_frame(&self, event: &str, text: &str) {
        let _ = self.events.send(ChannelEvent::Frame(WireFrame::event(
            event.to_string(),
            text.to_string(),
        )));
    }

    /// Simulates the wire closing.
    pub fn close(&self, error: Option<NetworkError>) {
        let _ = self.events.send(ChannelEvent::Closed(error));
    }

    /// Drains every outbound text payload sent so far.
    pub fn drain_texts(&self) -> Vec<String> {
        let mut receiver = self.commands.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(command) = receiver.try_recv() {
            if let ChannelCommand::Text(text) = command {
                out.push(text);
            }
        }
        out
    }
}

/// Scripted [`Transport`] capturing every open attempt.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    pub opens: Mutex<Vec<(String, tokio::time::Instant)>>,
    pub sessions: Mutex<Vec<Arc<Session>>>,
}

impl FakeTransport {
    /// Creates a transport whose open calls follow `script`; once the script
    /// is exhausted every further open succeeds.
    pub fn scripted(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn open_times(&self) -> Vec<tokio::time::Instant> {
        self.opens.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn open_urls(&self) -> Vec<String> {
        self.opens.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn session(&self, index: usize) -> Arc<Session> {
        self.sessions.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, url: &str) -> Result<ChannelHandle, NetworkError> {
        self.opens
            .lock()
            .unwrap()
            .push((url.to_string(), tokio::time::Instant::now()));
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Open);
        match behavior {
            Scripted::Fail => Err(NetworkError::Connect("scripted refusal".to_string())),
            Scripted::FailAuth => Err(NetworkError::Unauthorized { status: 401 }),
            Scripted::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Scripted::Open => {
                let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                self.sessions.lock().unwrap().push(Arc::new(Session {
                    url: url.to_string(),
                    opened_at: tokio::time::Instant::now(),
                    events: event_tx,
                    commands: Mutex::new(cmd_rx),
                }));
                Ok(ChannelHandle {
                    commands: cmd_tx,
                    events: event_rx,
                })
            }
        }
    }
}

/// Notification sink recording raise/cancel calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub raised: Mutex<Vec<(NotificationId, Notification)>>,
    pub cancelled: Mutex<Vec<NotificationId>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, id: NotificationId, notification: Notification) {
        self.raised.lock().unwrap().push((id, notification));
    }

    fn cancel(&self, id: NotificationId) {
        self.cancelled.lock().unwrap().push(id);
    }
}

/// Lets spawned manager tasks run until they are all parked again.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Initializes test logging once; repeated calls are a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
