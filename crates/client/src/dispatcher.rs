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

//! Message classification and fan-out.
//!
//! Subscriptions are keyed by a typed composite key (event kind plus an
//! optional connection scope) rather than concatenated strings. Dispatch
//! order for one message: connection-scoped handlers, then global handlers,
//! each in registration order. A panicking handler is isolated and logged;
//! the remaining handlers still run.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ahash::AHashSet;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tidelink_network::{WireFrame, frame::parse_inbound};

use crate::{
    events::{EventKind, InboundMessage, MessageCategory},
    registry::ConnectionId,
};

/// A subscriber callback.
pub type MessageHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Token identifying one registered handler; required to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Typed composite subscription key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// The event kind subscribed to.
    pub event: EventKind,
    /// `Some` scopes the subscription to one connection; `None` is global.
    pub connection: Option<ConnectionId>,
}

/// Classifies inbound frames and fans them out to subscribers.
pub struct MessageDispatcher {
    next_id: AtomicU64,
    subscriptions: DashMap<SubscriptionKey, Vec<(HandlerId, MessageHandler)>>,
    categories: DashMap<MessageCategory, Vec<(HandlerId, MessageHandler)>>,
    paused: DashSet<ConnectionId>,
    suppressible: AHashSet<MessageCategory>,
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .field("categories", &self.categories.len())
            .field("paused", &self.paused.len())
            .field("suppressible", &self.suppressible)
            .finish()
    }
}

impl MessageDispatcher {
    /// Creates a dispatcher with the given suppressible category set.
    #[must_use]
    pub fn new(suppressible: AHashSet<MessageCategory>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: DashMap::new(),
            categories: DashMap::new(),
            paused: DashSet::new(),
            suppressible,
        }
    }

    fn allocate_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a handler for `event`, optionally scoped to one connection.
    pub fn subscribe(
        &self,
        event: EventKind,
        connection: Option<ConnectionId>,
        handler: MessageHandler,
    ) -> HandlerId {
        let id = self.allocate_id();
        self.subscriptions
            .entry(SubscriptionKey { event, connection })
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes a previously registered handler. Unknown ids are a no-op.
    pub fn unsubscribe(&self, event: EventKind, connection: Option<ConnectionId>, id: HandlerId) {
        let key = SubscriptionKey { event, connection };
        if let Some(mut entry) = self.subscriptions.get_mut(&key) {
            entry.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Registers a handler for every message of `category`.
    pub fn on_category(&self, category: MessageCategory, handler: MessageHandler) -> HandlerId {
        let id = self.allocate_id();
        self.categories.entry(category).or_default().push((id, handler));
        id
    }

    /// Removes a category handler. Unknown ids are a no-op.
    pub fn off_category(&self, category: MessageCategory, id: HandlerId) {
        if let Some(mut entry) = self.categories.get_mut(&category) {
            entry.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Discards suppressible-category messages for `connection` until resumed.
    pub fn pause_delivery(&self, connection: ConnectionId) {
        self.paused.insert(connection);
    }

    /// Resumes full delivery for `connection`.
    pub fn resume_delivery(&self, connection: ConnectionId) {
        self.paused.remove(&connection);
    }

    /// Returns `true` when delivery for `connection` is paused.
    #[must_use]
    pub fn is_paused(&self, connection: &ConnectionId) -> bool {
        self.paused.contains(connection)
    }

    /// Classifies and delivers one wire frame.
    ///
    /// Returns the delivered message, or `None` when the frame was dropped
    /// (malformed payload, or suppressed while paused). Parse failures never
    /// reach subscribers and never escape as errors.
    pub fn dispatch(&self, connection_id: ConnectionId, frame: &WireFrame) -> Option<InboundMessage> {
        let (kind, payload) = match &frame.event {
            Some(event) => match serde_json::from_str::<Value>(&frame.text) {
                Ok(payload) => (event.clone(), payload),
                Err(e) => {
                    tracing::warn!("dropping malformed `{event}` frame on {connection_id}: {e}");
                    return None;
                }
            },
            None => match parse_inbound(&frame.text) {
                Ok(inbound) => (inbound.kind, inbound.payload),
                Err(e) => {
                    tracing::warn!("dropping malformed frame on {connection_id}: {e}");
                    return None;
                }
            },
        };

        let category = MessageCategory::classify(&kind);
        if self.suppressible.contains(&category) && self.is_paused(&connection_id) {
            tracing::debug!("delivery paused; discarding `{kind}` frame on {connection_id}");
            return None;
        }

        let message = InboundMessage {
            connection_id,
            kind,
            category,
            payload,
        };
        self.invoke(EventKind::Message, connection_id, &message);
        self.invoke_category(category, &message);
        Some(message)
    }

    /// Delivers a lifecycle event (connected/closed) to its subscribers.
    pub fn emit_lifecycle(&self, connection_id: ConnectionId, event: EventKind) {
        let message = InboundMessage {
            connection_id,
            kind: event.to_string(),
            category: MessageCategory::Control,
            payload: Value::Null,
        };
        self.invoke(event, connection_id, &message);
    }

    fn invoke(&self, event: EventKind, connection_id: ConnectionId, message: &InboundMessage) {
        for key in [
            SubscriptionKey {
                event,
                connection: Some(connection_id),
            },
            SubscriptionKey {
                event,
                connection: None,
            },
        ] {
            for handler in self.handlers_for(&key) {
                Self::run(&handler, message);
            }
        }
    }

    fn invoke_category(&self, category: MessageCategory, message: &InboundMessage) {
        let handlers: Vec<MessageHandler> = self
            .categories
            .get(&category)
            .map(|entry| entry.value().iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            Self::run(&handler, message);
        }
    }

    // Handlers are cloned out before invocation so a handler may freely
    // subscribe or unsubscribe without deadlocking the table.
    fn handlers_for(&self, key: &SubscriptionKey) -> Vec<MessageHandler> {
        self.subscriptions
            .get(key)
            .map(|entry| entry.value().iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    fn run(handler: &MessageHandler, message: &InboundMessage) {
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(message)));
        if caught.is_err() {
            tracing::error!(
                "handler panicked on `{}` from {}; remaining handlers still run",
                message.kind,
                message.connection_id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn dispatcher() -> MessageDispatcher {
        MessageDispatcher::new([MessageCategory::Chat].into_iter().collect())
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> MessageHandler {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn chat_frame() -> WireFrame {
        WireFrame::text(r#"{"type":"msg","data":{"content":"hi"}}"#.to_string())
    }

    #[rstest]
    fn malformed_frame_is_dropped_without_invocations(dispatcher: MessageDispatcher) {
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(EventKind::Message, None, counting_handler(count.clone()));

        let delivered =
            dispatcher.dispatch("room1".into(), &WireFrame::text("{not json".to_string()));

        assert!(delivered.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    fn scoped_handlers_run_before_global(dispatcher: MessageDispatcher) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scoped_order = order.clone();
        let global_order = order.clone();
        let id = ConnectionId::new("room1");

        dispatcher.subscribe(
            EventKind::Message,
            None,
            Arc::new(move |_| global_order.lock().unwrap().push("global")),
        );
        dispatcher.subscribe(
            EventKind::Message,
            Some(id),
            Arc::new(move |_| scoped_order.lock().unwrap().push("scoped")),
        );

        dispatcher.dispatch(id, &chat_frame());
        assert_eq!(*order.lock().unwrap(), vec!["scoped", "global"]);
    }

    #[rstest]
    fn scoped_handler_ignores_other_connections(dispatcher: MessageDispatcher) {
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(
            EventKind::Message,
            Some("room1".into()),
            counting_handler(count.clone()),
        );

        dispatcher.dispatch("room2".into(), &chat_frame());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        dispatcher.dispatch("room1".into(), &chat_frame());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn unsubscribe_stops_delivery_and_unknown_id_is_noop(dispatcher: MessageDispatcher) {
        let count = Arc::new(AtomicUsize::new(0));
        let id = dispatcher.subscribe(EventKind::Message, None, counting_handler(count.clone()));

        dispatcher.dispatch("room1".into(), &chat_frame());
        dispatcher.unsubscribe(EventKind::Message, None, id);
        dispatcher.dispatch("room1".into(), &chat_frame());

        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Unsubscribing again (or a never-registered id) must not error.
        dispatcher.unsubscribe(EventKind::Message, None, id);
        dispatcher.unsubscribe(EventKind::Message, Some("ghost".into()), HandlerId(9999));
    }

    #[rstest]
    fn panicking_handler_does_not_block_others(dispatcher: MessageDispatcher) {
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(
            EventKind::Message,
            None,
            Arc::new(|_| panic!("handler failure")),
        );
        dispatcher.subscribe(EventKind::Message, None, counting_handler(count.clone()));

        let delivered = dispatcher.dispatch("room1".into(), &chat_frame());

        assert!(delivered.is_some());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn pause_discards_only_suppressible_categories(dispatcher: MessageDispatcher) {
        let chat_count = Arc::new(AtomicUsize::new(0));
        let wallet_count = Arc::new(AtomicUsize::new(0));
        dispatcher.on_category(MessageCategory::Chat, counting_handler(chat_count.clone()));
        dispatcher.on_category(MessageCategory::Wallet, counting_handler(wallet_count.clone()));
        let id = ConnectionId::new("room1");

        dispatcher.pause_delivery(id);
        assert!(dispatcher.dispatch(id, &chat_frame()).is_none());
        let wallet = WireFrame::text(r#"{"type":"wallets","data":{"balance":1}}"#.to_string());
        assert!(dispatcher.dispatch(id, &wallet).is_some());

        assert_eq!(chat_count.load(Ordering::SeqCst), 0);
        assert_eq!(wallet_count.load(Ordering::SeqCst), 1);

        dispatcher.resume_delivery(id);
        assert!(dispatcher.dispatch(id, &chat_frame()).is_some());
        assert_eq!(chat_count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn pause_is_per_connection(dispatcher: MessageDispatcher) {
        dispatcher.pause_delivery("room1".into());
        assert!(dispatcher.dispatch("room2".into(), &chat_frame()).is_some());
    }

    #[rstest]
    fn category_routing_matches_classification(dispatcher: MessageDispatcher) {
        let game_count = Arc::new(AtomicUsize::new(0));
        let handler_id =
            dispatcher.on_category(MessageCategory::Game, counting_handler(game_count.clone()));

        let frame = WireFrame::event("stick".to_string(), r#"{"points":3}"#.to_string());
        dispatcher.dispatch("push".into(), &frame);
        assert_eq!(game_count.load(Ordering::SeqCst), 1);

        dispatcher.off_category(MessageCategory::Game, handler_id);
        dispatcher.dispatch("push".into(), &frame);
        assert_eq!(game_count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn sse_frames_use_event_name_for_classification(dispatcher: MessageDispatcher) {
        let delivered = dispatcher
            .dispatch(
                "push".into(),
                &WireFrame::event("wallets".to_string(), r#"{"balance":5}"#.to_string()),
            )
            .unwrap();
        assert_eq!(delivered.category, MessageCategory::Wallet);
        assert_eq!(delivered.kind, "wallets");
    }

    #[rstest]
    fn lifecycle_events_reach_subscribers(dispatcher: MessageDispatcher) {
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(EventKind::Connected, None, counting_handler(count.clone()));

        dispatcher.emit_lifecycle("room1".into(), EventKind::Connected);
        dispatcher.emit_lifecycle("room1".into(), EventKind::Closed);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
