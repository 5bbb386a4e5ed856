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

//! JSON wire frame codec.
//!
//! Outbound control frames are JSON objects discriminated by an integer
//! `type` field (`1` identify, `4` heartbeat). Inbound frames are JSON
//! objects carrying a `type` (string or integer) and an optional `data`
//! payload; anything that fails to parse is reported as
//! [`NetworkError::Parse`] so the dispatch layer can drop it.

use serde_json::{Value, json};

use crate::error::NetworkError;

/// Outbound control frame discriminators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlKind {
    /// Login/identify frame sent once after a session opens.
    Identify = 1,
    /// Keep-alive frame emitted by the heartbeat scheduler.
    Heartbeat = 4,
}

impl From<ControlKind> for u8 {
    fn from(kind: ControlKind) -> Self {
        kind as u8
    }
}

/// An outbound control frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundControl {
    /// The frame discriminator.
    pub kind: ControlKind,
    /// Optional payload carried under `data`.
    pub data: Option<Value>,
}

impl OutboundControl {
    /// Creates an identify frame with the given payload.
    #[must_use]
    pub const fn identify(data: Value) -> Self {
        Self {
            kind: ControlKind::Identify,
            data: Some(data),
        }
    }

    /// Creates a heartbeat frame.
    #[must_use]
    pub const fn heartbeat() -> Self {
        Self {
            kind: ControlKind::Heartbeat,
            data: None,
        }
    }

    /// Renders the frame as its JSON wire representation.
    #[must_use]
    pub fn to_json(&self) -> String {
        match &self.data {
            Some(data) => json!({ "type": u8::from(self.kind), "data": data }).to_string(),
            None => json!({ "type": u8::from(self.kind) }).to_string(),
        }
    }
}

/// A parsed inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    /// The frame `type` rendered as text (integer types are stringified).
    pub kind: String,
    /// The full parsed JSON payload.
    pub payload: Value,
}

impl InboundFrame {
    /// Returns the `data` field of the payload, if present.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}

/// Parses an inbound wire frame.
///
/// # Errors
///
/// Returns [`NetworkError::Parse`] when the text is not valid JSON.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, NetworkError> {
    let payload: Value =
        serde_json::from_str(text).map_err(|e| NetworkError::Parse(e.to_string()))?;
    let kind = match payload.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Ok(InboundFrame { kind, payload })
}
