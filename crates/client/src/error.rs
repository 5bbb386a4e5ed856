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

//! Error types for the connection manager.

use thiserror::Error;
use tidelink_network::NetworkError;

use crate::{credential::CredentialKind, registry::ConnectionId};

/// Errors surfaced to callers of the connection manager.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A connect was issued while a previous attempt for the same id is
    /// still in flight.
    #[error("connection `{0}` is already connecting")]
    AlreadyConnecting(ConnectionId),
    /// The connection requires a credential the store does not hold.
    #[error("no credential available ({0})")]
    MissingCredential(CredentialKind),
    /// The server rejected the credential during a handshake.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// The connection was manually closed while the handshake was in flight.
    #[error("connection `{0}` closed during connect")]
    ClosedDuringConnect(ConnectionId),
    /// A transport-level failure.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// A REST collaborator failure during the push handshake.
    #[error("gateway error: {0}")]
    Gateway(String),
}

impl ClientError {
    /// Returns `true` if this error represents a credential rejection.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Network(NetworkError::Unauthorized { .. })
        )
    }
}
