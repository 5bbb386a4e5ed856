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

//! Error types for transport operations.

use thiserror::Error;

/// Errors produced while opening or driving a transport channel.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The transport handshake could not be completed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The server rejected the handshake with a non-success HTTP status.
    #[error("HTTP error (status {status})")]
    Http {
        /// The HTTP status code returned by the server.
        status: u16,
    },
    /// The server rejected the credential (HTTP 401 or 403).
    ///
    /// Distinct from [`NetworkError::Http`] so callers can route
    /// authentication failures away from the transport retry loop.
    #[error("unauthorized (status {status})")]
    Unauthorized {
        /// The HTTP status code returned by the server.
        status: u16,
    },
    /// The open stream produced an error mid-session.
    #[error("stream error: {0}")]
    Stream(String),
    /// A wire frame could not be decoded.
    #[error("malformed frame: {0}")]
    Parse(String),
    /// The target URL could not be interpreted.
    #[error("invalid URL: {0}")]
    Url(String),
}

impl NetworkError {
    /// Returns `true` if this error represents a credential rejection.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
