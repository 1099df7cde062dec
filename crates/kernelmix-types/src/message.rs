//! Kernel protocol messages carried over a client's live channel.
//!
//! The envelope mirrors the kernel wire protocol as it travels over a
//! WebSocket: a header, the parent header it replies to, free-form metadata
//! and content, and the channel name (`shell`, `iopub`, `stdin`, `control`).
//! The mixing layer only ever looks at `header.msg_type` and
//! `content.execution_state`; everything else passes through untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::SessionId;
use crate::model::ExecutionState;

/// Kernel protocol version stamped on locally synthesized messages.
pub const PROTOCOL_VERSION: &str = "5.3";

/// Channel carrying status broadcasts.
pub const IOPUB_CHANNEL: &str = "iopub";

/// Message header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_id: String,
    pub msg_type: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub username: String,
    /// ISO-8601 timestamp; kept as text so foreign formats survive a round trip.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub version: String,
}

impl MessageHeader {
    /// Fresh header with a new message id and the current time.
    pub fn new(msg_type: impl Into<String>, session: &SessionId) -> Self {
        Self::at(msg_type, session, Utc::now())
    }

    /// Fresh header stamped with an explicit time.
    pub fn at(msg_type: impl Into<String>, session: &SessionId, date: DateTime<Utc>) -> Self {
        Self {
            msg_id: uuid::Uuid::new_v4().to_string(),
            msg_type: msg_type.into(),
            session: session.to_string(),
            username: String::new(),
            date: date.to_rfc3339_opts(SecondsFormat::Micros, true),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// One message on a kernel channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Channel name (`shell`, `iopub`, `stdin`, `control`).
    #[serde(default)]
    pub channel: String,
    pub header: MessageHeader,
    /// Header of the request this message answers; empty object when unsolicited.
    #[serde(default = "empty_object")]
    pub parent_header: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ChannelMessage {
    /// Build a message on `channel` with the given type and content.
    pub fn new(
        channel: impl Into<String>,
        msg_type: impl Into<String>,
        session: &SessionId,
        content: Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            header: MessageHeader::new(msg_type, session),
            parent_header: empty_object(),
            metadata: Map::new(),
            content,
            buffers: Vec::new(),
        }
    }

    /// Unsolicited `status` broadcast on iopub.
    pub fn status(session: &SessionId, state: ExecutionState) -> Self {
        Self::new(
            IOPUB_CHANNEL,
            "status",
            session,
            serde_json::json!({ "execution_state": state }),
        )
    }

    /// Build a reply to `parent` on the same channel.
    pub fn reply_to(parent: &ChannelMessage, msg_type: impl Into<String>, content: Value) -> Self {
        let mut header = MessageHeader::new(msg_type, &SessionId::nil());
        header.session = parent.header.session.clone();
        header.username = parent.header.username.clone();
        Self {
            channel: parent.channel.clone(),
            header,
            parent_header: serde_json::to_value(&parent.header).unwrap_or_else(|_| empty_object()),
            metadata: Map::new(),
            content,
            buffers: Vec::new(),
        }
    }

    /// Message type from the header.
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    /// The execution state this message's content reports, if any.
    ///
    /// Unrecognized state strings map to [`ExecutionState::Unknown`].
    pub fn execution_state(&self) -> Option<ExecutionState> {
        self.content
            .get("execution_state")
            .and_then(Value::as_str)
            .map(|s| s.parse().unwrap_or(ExecutionState::Unknown))
    }

    /// True when the content announces `execution_state: "starting"`.
    pub fn reports_starting(&self) -> bool {
        self.execution_state() == Some(ExecutionState::Starting)
    }
}
