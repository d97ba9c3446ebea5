//! Typed ID wrappers for sessions and execution events.
//!
//! IDs are opaque strings. The dashboard backend hands out integer ids for
//! sessions, so deserialisation accepts either a JSON string or an unsigned
//! integer and normalises both to the string form.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum RawId {
                    Text(String),
                    Number(u64),
                }

                Ok(match RawId::deserialize(deserializer)? {
                    RawId::Text(value) => Self(value),
                    RawId::Number(value) => Self(value.to_string()),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Identifier for an agent execution session.
    SessionId
);
typed_id!(
    /// Identifier for a single recorded execution event.
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_from_string() {
        let id = SessionId::from_string("test-session");
        assert_eq!(id.as_str(), "test-session");
        assert_eq!(id.to_string(), "test-session");
    }

    #[test]
    fn integer_ids_normalise_to_strings() {
        let from_json: SessionId = serde_json::from_str("42").unwrap();
        assert_eq!(from_json, SessionId::from(42_u64));
        assert_eq!(from_json.as_str(), "42");
        assert_eq!(serde_json::to_string(&from_json).unwrap(), "\"42\"");
    }

    #[test]
    fn string_ids_deserialize_verbatim() {
        let id: EventId = serde_json::from_str("\"EVT001\"").unwrap();
        assert_eq!(id.as_str(), "EVT001");
    }

    #[test]
    fn event_id_new_is_unique() {
        assert_ne!(EventId::new_uuid(), EventId::new_uuid());
    }

    #[test]
    fn typed_id_hash_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(SessionId::from("same"));
        assert!(set.contains(&SessionId::from_string("same")));
    }
}
