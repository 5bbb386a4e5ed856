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

//! Read-only access to externally-owned credentials.
//!
//! The connection manager never mints or refreshes credentials; it reads the
//! current value when (re)resolving a connection URL and reports invalidation
//! when a server rejects one. Ownership of the values stays with the
//! application.

use std::fmt::Debug;

use ahash::AHashMap;
use parking_lot::RwLock;
use strum::Display;

/// The credential families used by the transports.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum CredentialKind {
    /// Community API key, embedded as an `apiKey` query parameter.
    ApiKey,
    /// Bearer token for the push account, sent as an `Authorization` header
    /// on REST calls and an `authorization` query parameter on the stream.
    Bearer,
}

impl CredentialKind {
    /// The query parameter name this credential is embedded under.
    #[must_use]
    pub const fn query_param(&self) -> &'static str {
        match self {
            Self::ApiKey => "apiKey",
            Self::Bearer => "authorization",
        }
    }
}

/// Read-only view over the application's credentials.
pub trait CredentialStore: Send + Sync + Debug {
    /// Returns the current credential of the given kind, or `None` when the
    /// application holds none. Absence is not an error.
    fn get(&self, kind: CredentialKind) -> Option<String>;

    /// Reports that the server rejected the credential, so the owner can
    /// drop it and prompt for re-authentication.
    fn invalidate(&self, kind: CredentialKind);
}

/// In-memory [`CredentialStore`] for applications and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    values: RwLock<AHashMap<CredentialKind, String>>,
}

impl MemoryCredentials {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the credential of the given kind.
    pub fn set(&self, kind: CredentialKind, value: impl Into<String>) {
        self.values.write().insert(kind, value.into());
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, kind: CredentialKind) -> Option<String> {
        self.values.read().get(&kind).cloned()
    }

    fn invalidate(&self, kind: CredentialKind) {
        if self.values.write().remove(&kind).is_some() {
            tracing::info!("credential invalidated: {kind}");
        }
    }
}
