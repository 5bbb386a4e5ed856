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

//! Background notification side channel.
//!
//! Observes dispatched messages together with per-connection window focus.
//! While a surface is blurred, a notifiable message raises exactly one
//! external notification, replacing any notification still pending for the
//! same connection.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ahash::AHashSet;
use dashmap::DashMap;
use strum::Display;

use crate::{
    events::{InboundMessage, MessageCategory},
    registry::ConnectionId,
};

/// Visibility of the surface consuming a connection's messages.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum FocusState {
    /// The surface is visible; no notifications are raised.
    Focused,
    /// The surface is hidden; notifiable messages raise notifications.
    Blurred,
}

/// Identifies one raised notification so it can be cancelled/replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

/// The payload handed to the notification sink.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    /// The connection the triggering message arrived on.
    pub connection_id: ConnectionId,
    /// The raw wire type or event name of the triggering message.
    pub kind: String,
    /// The rendered message data.
    pub body: String,
}

/// External notification side effect (OS notification, reminder window).
pub trait NotificationSink: Send + Sync {
    /// Raises a notification under the given id.
    fn notify(&self, id: NotificationId, notification: Notification);

    /// Cancels a previously raised notification. Unknown ids are a no-op.
    fn cancel(&self, id: NotificationId);
}

/// Default sink that records notifications to the log only.
///
/// Applications surface real desktop notifications by injecting their own
/// [`NotificationSink`].
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, id: NotificationId, notification: Notification) {
        tracing::info!(
            "notification {}: `{}` on {}",
            id.0,
            notification.kind,
            notification.connection_id,
        );
    }

    fn cancel(&self, id: NotificationId) {
        tracing::debug!("notification {} cancelled", id.0);
    }
}

/// Tracks focus and raises at most one outstanding notification per
/// connection.
pub struct BackgroundNotifier {
    sink: Arc<dyn NotificationSink>,
    notifiable: AHashSet<MessageCategory>,
    next_id: AtomicU64,
    focus: DashMap<ConnectionId, FocusState>,
    pending: DashMap<ConnectionId, NotificationId>,
}

impl std::fmt::Debug for BackgroundNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundNotifier")
            .field("notifiable", &self.notifiable)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl BackgroundNotifier {
    /// Creates a notifier over the given sink and notifiable category set.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, notifiable: AHashSet<MessageCategory>) -> Self {
        Self {
            sink,
            notifiable,
            next_id: AtomicU64::new(1),
            focus: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Records a focus transition for `connection`.
    ///
    /// Regaining focus cancels the outstanding notification, if any; the
    /// surface is visible again.
    pub fn set_focus(&self, connection: ConnectionId, state: FocusState) {
        self.focus.insert(connection, state);
        if state == FocusState::Focused {
            if let Some((_, pending)) = self.pending.remove(&connection) {
                self.sink.cancel(pending);
            }
        }
    }

    /// Returns the tracked focus state; unknown connections count as focused.
    #[must_use]
    pub fn focus(&self, connection: &ConnectionId) -> FocusState {
        self.focus
            .get(connection)
            .map_or(FocusState::Focused, |entry| *entry.value())
    }

    /// Observes one dispatched message, raising a notification when the
    /// owning surface is blurred and the category is notifiable.
    pub fn observe(&self, message: &InboundMessage) {
        if !self.notifiable.contains(&message.category) {
            return;
        }
        if self.focus(&message.connection_id) == FocusState::Focused {
            return;
        }
        // Replace any notification still pending for this connection.
        if let Some((_, previous)) = self.pending.remove(&message.connection_id) {
            self.sink.cancel(previous);
        }
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sink.notify(
            id,
            Notification {
                connection_id: message.connection_id,
                kind: message.kind.clone(),
                body: message
                    .data()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            },
        );
        self.pending.insert(message.connection_id, id);
    }
}
