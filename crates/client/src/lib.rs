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

//! Client-side real-time connection manager.
//!
//! Maintains one or more persistent, message-oriented connections between an
//! application and remote real-time endpoints (chat rooms, wallet and
//! notification push, long-running game event streams). The manager owns:
//!
//! - the [`registry`] of live and pending connections and their lifecycle
//!   state machine,
//! - automatic reconnection with exponential backoff,
//! - keep-alive heartbeating per open connection,
//! - typed message classification and fan-out ([`dispatcher`]),
//! - the background-notification side channel ([`notifier`]),
//! - a server-push adapter with a REST identity/subscribe handshake
//!   ([`push`]).
//!
//! Credentials, REST request mapping beyond the push handshake, message
//! content semantics and UI rendering belong to the application; they are
//! reached through the collaborator traits in [`credential`], [`notifier`]
//! and [`push`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tidelink_client::{
//!     config::{ConnectOptions, ManagerConfig},
//!     credential::{CredentialKind, MemoryCredentials},
//!     events::EventKind,
//!     manager::ConnectionManager,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Arc::new(MemoryCredentials::new());
//! credentials.set(CredentialKind::ApiKey, "key");
//!
//! let manager = ConnectionManager::new(ManagerConfig::default(), credentials);
//! manager.subscribe(
//!     EventKind::Message,
//!     None,
//!     Arc::new(|message| println!("{}: {}", message.kind, message.payload)),
//! );
//!
//! let options = ConnectOptions {
//!     credential: Some(CredentialKind::ApiKey),
//!     ..Default::default()
//! };
//! manager.connect("room1", "wss://host/chat-room-channel", options).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod manager;
pub mod notifier;
pub mod push;
pub mod registry;

pub use config::{ConnectOptions, ManagerConfig, PushConfig};
pub use credential::{CredentialKind, CredentialStore, MemoryCredentials};
pub use dispatcher::{HandlerId, MessageDispatcher, MessageHandler};
pub use error::ClientError;
pub use events::{EventKind, InboundMessage, MessageCategory};
pub use manager::ConnectionManager;
pub use notifier::{BackgroundNotifier, FocusState, Notification, NotificationSink};
pub use push::{PushChannel, PushState, PushStatus};
pub use registry::{Connection, ConnectionId, ConnectionState, ConnectionStatus};
