//! Execution events recorded for a session.
//!
//! Each event carries a list of flag tags. Event producers are not always
//! well behaved, so the `flags` field is read leniently: an absent field,
//! `null`, or any non-array value reads as "no flags", and non-string array
//! entries are dropped.

use crate::ids::{EventId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Empty when the producer did not assign one.
    #[serde(default)]
    pub event_id: EventId,
    /// Empty when the record came from a per-session log without it.
    #[serde(default)]
    pub session_id: SessionId,
    pub event_type: String,
    #[serde(default, deserialize_with = "lenient_flags")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ExecutionEvent {
    pub fn new<I, S>(
        session_id: impl Into<SessionId>,
        event_type: impl Into<String>,
        flags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_id: EventId::new_uuid(),
            session_id: session_id.into(),
            event_type: event_type.into(),
            flags: flags.into_iter().map(Into::into).collect(),
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn has_flags(&self) -> bool {
        !self.flags.is_empty()
    }
}

fn lenient_flags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(entries) = raw else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            serde_json::Value::String(flag) => Some(flag),
            _ => None,
        })
        .collect())
}
