use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Store ids come back as strings from some backends and as integers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }
    };
}

opaque_id!(
    /// Store-assigned identifier of a persisted price level.
    LevelId
);

opaque_id!(
    /// Store-assigned identifier of a study snapshot.
    SnapshotId
);

opaque_id!(
    /// Identity of the authenticated owner of levels and snapshots.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_stringified() {
        let id: LevelId = serde_json::from_str("42").unwrap();
        assert_eq!(id, LevelId::new("42"));
    }

    #[test]
    fn string_ids_pass_through() {
        let id: SnapshotId = serde_json::from_str("\"8b1f-aa\"").unwrap();
        assert_eq!(id.as_str(), "8b1f-aa");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"8b1f-aa\"");
    }

    #[test]
    fn from_counter() {
        assert_eq!(UserId::from(7).to_string(), "7");
    }
}
