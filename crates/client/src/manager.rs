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

//! The connection manager orchestrator.
//!
//! Composes the registry, dispatcher, heartbeat scheduler, reconnect policy
//! and background notifier behind one explicit component instance. The
//! manager is the only component that mutates connection state; transports
//! only report events.
//!
//! Construct one instance at application start and share it by reference;
//! there is intentionally no global singleton.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use parking_lot::Mutex;
use tidelink_network::{
    ChannelCommand, ChannelEvent, ChannelHandle, HeartbeatScheduler, Transport,
    WebSocketTransport, frame::OutboundControl,
};
use tokio::sync::mpsc;

use crate::{
    config::{ConnectOptions, ManagerConfig},
    credential::CredentialStore,
    dispatcher::{HandlerId, MessageDispatcher, MessageHandler},
    error::ClientError,
    events::{EventKind, MessageCategory},
    notifier::{BackgroundNotifier, FocusState, NotificationSink, TracingNotificationSink},
    registry::{
        ClosedDisposition, ConnectAdmission, Connection, ConnectionId, ConnectionRegistry,
        ConnectionStatus,
    },
};

/// Appends `key=value` to `url`, encoding the value.
fn append_query(url: &mut String, key: &str, value: &str) {
    let separator = if url.contains('?') { '&' } else { '?' };
    url.push(separator);
    url.push_str(key);
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}

/// Returns `true` when the URL already carries the query key.
fn has_query_key(url: &str, key: &str) -> bool {
    url.contains(&format!("{key}="))
}

/// Resolves the wire address: embeds the credential (unless the URL already
/// carries one) and appends extra params (existing keys win).
fn resolve_url(
    source: &str,
    credential_param: Option<&str>,
    credential: Option<&str>,
    params: &[(String, String)],
) -> String {
    let mut url = source.to_string();
    if let (Some(param), Some(value)) = (credential_param, credential) {
        if !has_query_key(&url, param) {
            append_query(&mut url, param, value);
        }
    }
    for (key, value) in params {
        if !has_query_key(&url, key) {
            append_query(&mut url, key, value);
        }
    }
    url
}

struct LiveConnection {
    commands: mpsc::UnboundedSender<ChannelCommand>,
    pump: tokio::task::JoinHandle<()>,
}

struct Inner {
    config: ManagerConfig,
    credentials: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
    registry: Mutex<ConnectionRegistry>,
    dispatcher: Arc<MessageDispatcher>,
    notifier: Arc<BackgroundNotifier>,
    heartbeats: HeartbeatScheduler,
    live: DashMap<ConnectionId, LiveConnection>,
    reconnects: DashMap<ConnectionId, tokio::task::JoinHandle<()>>,
}

impl Inner {
    /// Resolves the URL with a fresh credential read and opens the transport.
    ///
    /// Used for the initial connect and for every reconnect attempt, so a
    /// rotated credential is always picked up.
    async fn attempt_open(inner: Arc<Self>, id: ConnectionId) -> Result<Connection, ClientError> {
        let (resolved, options) = {
            let mut registry = inner.registry.lock();
            let Some(record) = registry.snapshot(&id) else {
                return Err(ClientError::ClosedDuringConnect(id));
            };
            let credential = match record.options.credential {
                Some(kind) => match inner.credentials.get(kind) {
                    Some(value) => Some(value),
                    None => {
                        tracing::warn!("refusing to open {id}: no {kind} credential");
                        registry.abandon(&id);
                        return Err(ClientError::MissingCredential(kind));
                    }
                },
                None => None,
            };
            let resolved = resolve_url(
                &record.source_url,
                record.options.credential.map(|kind| kind.query_param()),
                credential.as_deref(),
                &record.options.params,
            );
            registry.set_resolved_url(&id, resolved.clone());
            (resolved, record.options)
        };

        match inner.transport.open(&resolved).await {
            Ok(handle) => Self::session_opened(&inner, id, &options, handle),
            Err(e) if e.is_auth() => {
                tracing::warn!("authentication rejected for {id}: {e}");
                if let Some(kind) = options.credential {
                    inner.credentials.invalidate(kind);
                }
                inner.registry.lock().abandon(&id);
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!("connect failed for {id}: {e}");
                let disposition = inner.registry.lock().connect_failed(&id);
                Self::apply_disposition(&inner, id, disposition);
                Err(e.into())
            }
        }
    }

    fn session_opened(
        inner: &Arc<Self>,
        id: ConnectionId,
        options: &ConnectOptions,
        handle: ChannelHandle,
    ) -> Result<Connection, ClientError> {
        let snapshot = {
            let mut registry = inner.registry.lock();
            if registry.opened(&id) {
                registry.snapshot(&id)
            } else {
                None
            }
        };
        let Some(snapshot) = snapshot else {
            // Manually closed while the handshake was in flight.
            let _ = handle.commands.send(ChannelCommand::Close);
            return Err(ClientError::ClosedDuringConnect(id));
        };

        if let Some(identify) = &options.identify {
            let frame = OutboundControl::identify(identify.clone()).to_json();
            let _ = handle.commands.send(ChannelCommand::Text(frame));
        }
        inner.heartbeats.start(
            id.as_ustr(),
            handle.commands.clone(),
            inner.config.heartbeat_payload.clone(),
            Duration::from_millis(inner.config.heartbeat_interval_ms),
        );

        let commands = handle.commands;
        let pump = tokio::spawn(Self::pump(inner.clone(), id, handle.events));
        if let Some(previous) = inner.live.insert(id, LiveConnection { commands, pump }) {
            previous.pump.abort();
        }
        inner.dispatcher.emit_lifecycle(id, EventKind::Connected);
        tracing::info!("connection open: {id}");
        Ok(snapshot)
    }

    /// Drives one live session: frames into the dispatcher, closure into the
    /// registry and (when warranted) the reconnect schedule.
    async fn pump(
        inner: Arc<Self>,
        id: ConnectionId,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Frame(frame) => {
                    if let Some(message) = inner.dispatcher.dispatch(id, &frame) {
                        inner.notifier.observe(&message);
                    }
                }
                ChannelEvent::Closed(error) => {
                    match &error {
                        Some(e) => tracing::warn!("connection lost: {id}: {e}"),
                        None => tracing::info!("connection closed by remote: {id}"),
                    }
                    inner.heartbeats.stop(&id.as_ustr());
                    inner.live.remove(&id);
                    inner.dispatcher.emit_lifecycle(id, EventKind::Closed);
                    let disposition = inner.registry.lock().remote_closed(&id);
                    Self::apply_disposition(&inner, id, disposition);
                    break;
                }
            }
        }
    }

    fn apply_disposition(inner: &Arc<Self>, id: ConnectionId, disposition: ClosedDisposition) {
        match disposition {
            ClosedDisposition::Removed => {
                tracing::debug!("registry entry removed: {id}");
            }
            ClosedDisposition::Exhausted => {
                tracing::warn!("reconnect attempts exhausted: {id}");
            }
            ClosedDisposition::Retry {
                next_attempt,
                delay,
            } => {
                let max_attempts = inner.config.reconnect.max_attempts;
                tracing::info!(
                    "reconnecting {id} (attempt {next_attempt}/{max_attempts}) in {delay:?}",
                );
                let task_inner = inner.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    task_inner.reconnects.remove(&id);
                    if task_inner.registry.lock().begin_reconnect(&id).is_none() {
                        tracing::debug!("reconnect for {id} cancelled");
                        return;
                    }
                    // Boxed to break the attempt -> schedule -> attempt type cycle.
                    let attempt: std::pin::Pin<
                        Box<dyn std::future::Future<Output = Result<Connection, ClientError>> + Send>,
                    > = Box::pin(Self::attempt_open(task_inner.clone(), id));
                    if let Err(e) = attempt.await {
                        tracing::debug!("reconnect attempt for {id} failed: {e}");
                    }
                });
                if let Some(previous) = inner.reconnects.insert(id, handle) {
                    previous.abort();
                }
            }
        }
    }

    fn close_one(inner: &Arc<Self>, id: ConnectionId) {
        let existed = inner.registry.lock().mark_manual_close(&id);
        if let Some((_, handle)) = inner.reconnects.remove(&id) {
            handle.abort();
        }
        inner.heartbeats.stop(&id.as_ustr());
        if let Some((_, live)) = inner.live.remove(&id) {
            let _ = live.commands.send(ChannelCommand::Close);
            live.pump.abort();
            inner.dispatcher.emit_lifecycle(id, EventKind::Closed);
        }
        inner.registry.lock().remove(&id);
        if existed {
            tracing::info!("connection closed: {id}");
        }
    }
}

/// Public-facing connection manager.
///
/// Cheap to clone; clones share the same registry and subscription tables.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.inner.registry.lock().len())
            .field("live", &self.inner.live.len())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager over the real WebSocket transport with the default
    /// log-only notification sink.
    #[must_use]
    pub fn new(config: ManagerConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_parts(
            config,
            credentials,
            Arc::new(WebSocketTransport::new()),
            Arc::new(TracingNotificationSink),
        )
    }

    /// Creates a manager with an explicit transport and notification sink.
    #[must_use]
    pub fn with_parts(
        config: ManagerConfig,
        credentials: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let dispatcher = Arc::new(MessageDispatcher::new(config.suppressible.clone()));
        let notifier = Arc::new(BackgroundNotifier::new(sink, config.notifiable.clone()));
        let registry = Mutex::new(ConnectionRegistry::new(config.reconnect.clone()));
        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                transport,
                registry,
                dispatcher,
                notifier,
                heartbeats: HeartbeatScheduler::new(),
                live: DashMap::new(),
                reconnects: DashMap::new(),
            }),
        }
    }

    /// Opens (or reuses) the connection registered under `id`.
    ///
    /// Resolves once the transport handshake completes. An id that is
    /// already `Open` resolves immediately with the existing connection; an
    /// id that is still `Connecting` is rejected without creating a second
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error when a concurrent attempt is in flight, a required
    /// credential is missing or rejected, or the handshake fails. Handshake
    /// failures still enter the reconnect schedule unless the failure was an
    /// authentication rejection.
    pub async fn connect(
        &self,
        id: impl Into<ConnectionId>,
        url: &str,
        options: ConnectOptions,
    ) -> Result<Connection, ClientError> {
        let id = id.into();
        {
            let mut registry = self.inner.registry.lock();
            match registry.begin_connect(id, url, options)? {
                ConnectAdmission::AlreadyOpen => {
                    tracing::debug!("connect on open id {id}; reusing session");
                    return registry
                        .snapshot(&id)
                        .ok_or(ClientError::ClosedDuringConnect(id));
                }
                ConnectAdmission::Admitted => {}
            }
        }
        Inner::attempt_open(self.inner.clone(), id).await
    }

    /// Sends an application payload on `id`.
    ///
    /// Dropped with a log line when the connection is not open; sending
    /// never fails loudly.
    pub fn send(&self, id: impl Into<ConnectionId>, payload: impl Into<String>) {
        let id = id.into();
        match self.inner.live.get(&id) {
            Some(live) => {
                if live.commands.send(ChannelCommand::Text(payload.into())).is_err() {
                    tracing::warn!("send dropped; channel closing: {id}");
                }
            }
            None => tracing::warn!("send dropped; connection not open: {id}"),
        }
    }

    /// Closes the connection registered under `id`.
    ///
    /// Cancels any pending reconnect and heartbeat, removes the registry
    /// entry, and is idempotent: closing an unknown or already-closed id is
    /// a no-op.
    pub fn close(&self, id: impl Into<ConnectionId>) {
        Inner::close_one(&self.inner, id.into());
    }

    /// Closes every managed connection.
    pub fn close_all(&self) {
        for id in self.inner.registry.lock().ids() {
            Inner::close_one(&self.inner, id);
        }
    }

    /// Registers a message handler, optionally scoped to one connection.
    pub fn subscribe(
        &self,
        event: EventKind,
        connection: Option<ConnectionId>,
        handler: MessageHandler,
    ) -> HandlerId {
        self.inner.dispatcher.subscribe(event, connection, handler)
    }

    /// Removes a previously registered handler; unknown ids are a no-op.
    pub fn unsubscribe(&self, event: EventKind, connection: Option<ConnectionId>, id: HandlerId) {
        self.inner.dispatcher.unsubscribe(event, connection, id);
    }

    /// Registers a handler for every message of `category`.
    pub fn on_category(&self, category: MessageCategory, handler: MessageHandler) -> HandlerId {
        self.inner.dispatcher.on_category(category, handler)
    }

    /// Removes a category handler; unknown ids are a no-op.
    pub fn off_category(&self, category: MessageCategory, id: HandlerId) {
        self.inner.dispatcher.off_category(category, id);
    }

    /// Discards suppressible-category messages for `id` until resumed.
    pub fn pause_delivery(&self, id: impl Into<ConnectionId>) {
        self.inner.dispatcher.pause_delivery(id.into());
    }

    /// Resumes full delivery for `id`.
    pub fn resume_delivery(&self, id: impl Into<ConnectionId>) {
        self.inner.dispatcher.resume_delivery(id.into());
    }

    /// Records a focus transition for the surface consuming `id`.
    pub fn set_focus(&self, id: impl Into<ConnectionId>, state: FocusState) {
        self.inner.notifier.set_focus(id.into(), state);
    }

    /// Returns the status snapshot for `id`, or `None` when unknown.
    #[must_use]
    pub fn status(&self, id: impl Into<ConnectionId>) -> Option<ConnectionStatus> {
        self.inner.registry.lock().status(&id.into())
    }

    /// Returns the shared dispatcher (used by secondary channel adapters).
    #[must_use]
    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        self.inner.dispatcher.clone()
    }

    /// Returns the shared background notifier.
    #[must_use]
    pub fn notifier(&self) -> Arc<BackgroundNotifier> {
        self.inner.notifier.clone()
    }
}
