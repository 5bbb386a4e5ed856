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

//! Server-push channel adapter (SSE variant).
//!
//! Same lifecycle contract as the WebSocket connections, plus a one-time
//! handshake: confirm identity over REST, open the stream, then subscribe to
//! topics once the server issues a client id on the initial control event.
//!
//! Authentication failures are hard failures: the stored credential is
//! cleared and the adapter stays disconnected. Only transport-level failures
//! enter the reconnect schedule, with an attempt counter independent of the
//! WebSocket registry.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use strum::Display;
use tidelink_network::{ChannelCommand, ChannelEvent, ChannelHandle, SseTransport, Transport};
use tokio::sync::mpsc;

use crate::{
    config::PushConfig,
    credential::{CredentialKind, CredentialStore},
    dispatcher::MessageDispatcher,
    error::ClientError,
    notifier::BackgroundNotifier,
    registry::ConnectionId,
};

/// Well-known path for the identity confirmation request.
pub const IDENTITY_PATH: &str = "/game/me";
/// Well-known path for the realtime stream and the subscribe request.
pub const REALTIME_PATH: &str = "/api/realtime";
/// Name of the initial control event carrying the server-issued client id.
pub const CONNECT_EVENT: &str = "PB_CONNECT";

/// Lifecycle states of the push channel.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum PushState {
    /// No stream and no handshake in flight.
    Disconnected,
    /// Confirming identity / opening the stream.
    Handshaking,
    /// Client id received; topic subscribe in flight.
    Subscribing,
    /// Stream live and dispatching.
    Active,
}

/// Point-in-time status snapshot of the push channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushStatus {
    /// Current lifecycle state.
    pub state: PushState,
    /// Consecutive failed reconnect attempts.
    pub reconnect_attempts: u32,
    /// The server-issued client id, once known.
    pub client_id: Option<String>,
}

/// REST collaborator for the push handshake.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Confirms the credential is valid before opening the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] when the server rejects the credential,
    /// or [`ClientError::Gateway`] for other failures.
    async fn confirm_identity(&self, token: &str) -> Result<(), ClientError>;

    /// Subscribes the given client id to the topic list.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Gateway`] when the request fails.
    async fn subscribe_topics(
        &self,
        token: &str,
        client_id: &str,
        topics: &[String],
    ) -> Result<(), ClientError>;
}

/// [`PushGateway`] over HTTP.
#[derive(Debug)]
pub struct RestPushGateway {
    client: reqwest::Client,
    base_url: String,
}

impl RestPushGateway {
    /// Creates a gateway against the given service base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn map_status(context: &str, status: reqwest::StatusCode) -> Result<(), ClientError> {
        let code = status.as_u16();
        if code == 401 || code == 403 {
            return Err(ClientError::Auth(format!("{context} rejected (status {code})")));
        }
        if !status.is_success() {
            return Err(ClientError::Gateway(format!("{context} failed (status {code})")));
        }
        Ok(())
    }
}

#[async_trait]
impl PushGateway for RestPushGateway {
    async fn confirm_identity(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .get(self.endpoint(IDENTITY_PATH))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| ClientError::Gateway(e.to_string()))?;
        Self::map_status("identity confirmation", response.status())
    }

    async fn subscribe_topics(
        &self,
        token: &str,
        client_id: &str,
        topics: &[String],
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.endpoint(REALTIME_PATH))
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&json!({ "clientId": client_id, "subscriptions": topics }))
            .send()
            .await
            .map_err(|e| ClientError::Gateway(e.to_string()))?;
        Self::map_status("topic subscribe", response.status())
    }
}

struct PushInner {
    config: PushConfig,
    gateway: Arc<dyn PushGateway>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: Arc<MessageDispatcher>,
    notifier: Option<Arc<BackgroundNotifier>>,
    status: Mutex<PushStatus>,
    manual: AtomicBool,
    commands: Mutex<Option<mpsc::UnboundedSender<ChannelCommand>>>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
    reconnect: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PushInner {
    fn set_state(&self, state: PushState) {
        self.status.lock().state = state;
    }

    fn connection_id(&self) -> ConnectionId {
        ConnectionId::new(&self.config.connection_id)
    }

    async fn attempt(inner: Arc<Self>) -> Result<(), ClientError> {
        inner.set_state(PushState::Handshaking);

        let Some(token) = inner.credentials.get(CredentialKind::Bearer) else {
            tracing::warn!("refusing to open push channel: no bearer credential");
            inner.set_state(PushState::Disconnected);
            return Err(ClientError::MissingCredential(CredentialKind::Bearer));
        };

        if let Err(e) = inner.gateway.confirm_identity(&token).await {
            inner.set_state(PushState::Disconnected);
            if e.is_auth() {
                // Hard authentication failure: clear the credential and stay
                // down; retrying with the same token cannot succeed.
                tracing::warn!("push identity confirmation rejected: {e}");
                inner.credentials.invalidate(CredentialKind::Bearer);
                return Err(e);
            }
            tracing::warn!("push identity confirmation failed: {e}");
            Self::schedule_retry(&inner);
            return Err(e);
        }

        let url = format!(
            "{}{}?authorization={}",
            inner.config.base_url.trim_end_matches('/'),
            REALTIME_PATH,
            urlencoding::encode(&token),
        );
        match inner.transport.open(&url).await {
            Ok(handle) => {
                tracing::info!("push stream opened");
                inner.status.lock().reconnect_attempts = 0;
                *inner.commands.lock() = Some(handle.commands.clone());
                let pump = tokio::spawn(Self::pump(inner.clone(), handle));
                if let Some(previous) = inner.pump.lock().replace(pump) {
                    previous.abort();
                }
                Ok(())
            }
            Err(e) if e.is_auth() => {
                tracing::warn!("push stream rejected the credential: {e}");
                inner.credentials.invalidate(CredentialKind::Bearer);
                inner.set_state(PushState::Disconnected);
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!("push stream open failed: {e}");
                inner.set_state(PushState::Disconnected);
                Self::schedule_retry(&inner);
                Err(e.into())
            }
        }
    }

    async fn pump(inner: Arc<Self>, mut handle: ChannelHandle) {
        let connection_id = inner.connection_id();
        while let Some(event) = handle.events.recv().await {
            match event {
                ChannelEvent::Frame(frame) => {
                    if frame.event.as_deref() == Some(CONNECT_EVENT) {
                        Self::handle_connect_event(&inner, &frame.text).await;
                    }
                    if let Some(message) = inner.dispatcher.dispatch(connection_id, &frame) {
                        if let Some(notifier) = &inner.notifier {
                            notifier.observe(&message);
                        }
                    }
                }
                ChannelEvent::Closed(error) => {
                    match &error {
                        Some(e) => tracing::warn!("push stream lost: {e}"),
                        None => tracing::info!("push stream closed"),
                    }
                    {
                        let mut status = inner.status.lock();
                        status.state = PushState::Disconnected;
                        status.client_id = None;
                    }
                    *inner.commands.lock() = None;
                    if !inner.manual.load(Ordering::SeqCst) {
                        Self::schedule_retry(&inner);
                    }
                    break;
                }
            }
        }
    }

    /// Handles the initial control event: record the server-issued client id
    /// and subscribe to topics. A subscribe failure is logged; the channel
    /// stays active for the topics the server pushes anyway.
    async fn handle_connect_event(inner: &Arc<Self>, text: &str) {
        let client_id = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|value| value.get("clientId").and_then(Value::as_str).map(String::from));
        let Some(client_id) = client_id else {
            tracing::warn!("{CONNECT_EVENT} event carried no clientId");
            return;
        };
        tracing::info!("push client id assigned: {client_id}");
        {
            let mut status = inner.status.lock();
            status.client_id = Some(client_id.clone());
            status.state = PushState::Subscribing;
        }

        match inner.credentials.get(CredentialKind::Bearer) {
            Some(token) => {
                match inner
                    .gateway
                    .subscribe_topics(&token, &client_id, &inner.config.topics)
                    .await
                {
                    Ok(()) => {
                        tracing::info!("push topics subscribed: {:?}", inner.config.topics);
                    }
                    Err(e) => {
                        tracing::warn!("topic subscribe failed; channel stays active: {e}");
                    }
                }
            }
            None => tracing::warn!("topic subscribe skipped: no bearer credential"),
        }
        inner.set_state(PushState::Active);
    }

    fn schedule_retry(inner: &Arc<Self>) {
        if inner.manual.load(Ordering::SeqCst) {
            return;
        }
        let attempts = inner.status.lock().reconnect_attempts;
        if !inner.config.reconnect.should_retry(attempts) {
            tracing::warn!("push reconnect attempts exhausted");
            return;
        }
        inner.status.lock().reconnect_attempts = attempts + 1;
        let delay = inner.config.reconnect.delay_for(attempts);
        tracing::info!(
            "reconnecting push channel (attempt {}/{}) in {delay:?}",
            attempts + 1,
            inner.config.reconnect.max_attempts,
        );
        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_inner.manual.load(Ordering::SeqCst) {
                return;
            }
            // Boxed to break the attempt -> schedule -> attempt type cycle.
            let attempt: std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<(), ClientError>> + Send>,
            > = Box::pin(Self::attempt(task_inner.clone()));
            if let Err(e) = attempt.await {
                tracing::debug!("push reconnect attempt failed: {e}");
            }
        });
        if let Some(previous) = inner.reconnect.lock().replace(handle) {
            previous.abort();
        }
    }
}

/// The push channel adapter.
pub struct PushChannel {
    inner: Arc<PushInner>,
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("status", &self.status())
            .finish()
    }
}

impl PushChannel {
    /// Creates a push channel over HTTP/SSE against `config.base_url`.
    #[must_use]
    pub fn new(
        config: PushConfig,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: Arc<MessageDispatcher>,
    ) -> Self {
        let gateway = Arc::new(RestPushGateway::new(config.base_url.clone()));
        Self::with_parts(
            config,
            gateway,
            Arc::new(SseTransport::new()),
            credentials,
            dispatcher,
        )
    }

    /// Creates a push channel with explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: PushConfig,
        gateway: Arc<dyn PushGateway>,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: Arc<MessageDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(PushInner {
                config,
                gateway,
                transport,
                credentials,
                dispatcher,
                notifier: None,
                status: Mutex::new(PushStatus {
                    state: PushState::Disconnected,
                    reconnect_attempts: 0,
                    client_id: None,
                }),
                manual: AtomicBool::new(false),
                commands: Mutex::new(None),
                pump: Mutex::new(None),
                reconnect: Mutex::new(None),
            }),
        }
    }

    /// Attaches a background notifier observing dispatched push messages.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<BackgroundNotifier>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.notifier = Some(notifier),
            None => tracing::warn!("cannot attach notifier: push channel already shared"),
        }
        self
    }

    /// Performs the handshake and opens the stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the credential is missing or rejected, the
    /// identity confirmation fails, or the stream cannot be opened.
    /// Transport-level failures also enter the reconnect schedule.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.manual.store(false, Ordering::SeqCst);
        PushInner::attempt(self.inner.clone()).await
    }

    /// Tears the channel down and cancels any pending reconnect.
    pub fn disconnect(&self) {
        self.inner.manual.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.reconnect.lock().take() {
            handle.abort();
        }
        if let Some(commands) = self.inner.commands.lock().take() {
            let _ = commands.send(ChannelCommand::Close);
        }
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        let mut status = self.inner.status.lock();
        status.state = PushState::Disconnected;
        status.client_id = None;
        status.reconnect_attempts = 0;
        tracing::info!("push channel disconnected");
    }

    /// Returns a point-in-time status snapshot.
    #[must_use]
    pub fn status(&self) -> PushStatus {
        self.inner.status.lock().clone()
    }
}
