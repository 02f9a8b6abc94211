// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport wire frames.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "message", "message": {...}}
//! {"type": "channelUpdate", "channel": {...}}
//! {"type": "systemStatus", "status": "..."}
//! {"type": "error", "message": "..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChanlinkError;
use crate::types::{Channel, Message};

/// A frame on the push transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    /// One new message; its lane is carried by the message body.
    Message { message: Message },
    ChannelUpdate { channel: Channel },
    SystemStatus { status: String },
    Error { message: String },
}

impl Frame {
    /// Decode a text frame. Malformed input is a protocol violation.
    pub fn decode(text: &str) -> Result<Frame, ChanlinkError> {
        serde_json::from_str(text).map_err(|e| ChanlinkError::ProtocolViolation(e.to_string()))
    }

    pub fn encode(&self) -> String {
        // Every variant is a plain struct of serializable fields.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"frame encoding failed: {e}"}}"#)
        })
    }
}
