//! Server timestamps and checkpoint cursors

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Query parameter carrying the checkpoint timestamp
pub const SERVER_TIMESTAMP_PARAM: &str = "serverTimestamp";

/// Store-assigned revision token, strictly increasing within a collection.
///
/// Values are Unix milliseconds bumped past the previous allocation when the
/// clock stalls, so they stay unique even for writes in the same millisecond.
/// Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerTimestamp(i64);

impl ServerTimestamp {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ServerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("`serverTimestamp` is not an integer: {s}")))?;
        if value < 0 {
            return Err(Error::invalid_input("`serverTimestamp` must not be negative"));
        }
        Ok(Self(value))
    }
}

impl Serialize for ServerTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServerTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ServerTimestampVisitor)
    }
}

struct ServerTimestampVisitor;

impl Visitor<'_> for ServerTimestampVisitor {
    type Value = ServerTimestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a non-negative integer or decimal string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
        i64::try_from(value)
            .map(ServerTimestamp)
            .map_err(|_| E::custom("`serverTimestamp` out of range"))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
        if value < 0 {
            return Err(E::custom("`serverTimestamp` must not be negative"));
        }
        Ok(ServerTimestamp(value))
    }
}

/// Resume position for incremental pull: the last document a client consumed.
///
/// Ordered by `(server_timestamp, primary_key)`, the same order pull walks
/// the store in. Used only as an exclusive lower bound.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint {
    pub server_timestamp: ServerTimestamp,
    pub primary_key: String,
}

impl Checkpoint {
    pub fn new(primary_key: impl Into<String>, server_timestamp: ServerTimestamp) -> Self {
        Self {
            server_timestamp,
            primary_key: primary_key.into(),
        }
    }

    /// Wire view naming the key field after the collection's primary key
    pub const fn wire(&self, key_field: &'static str) -> WireCheckpoint<'_> {
        WireCheckpoint {
            checkpoint: self,
            key_field,
        }
    }
}

/// `{ <primaryKeyField>: string, serverTimestamp: string }`
#[derive(Debug)]
pub struct WireCheckpoint<'a> {
    checkpoint: &'a Checkpoint,
    key_field: &'static str,
}

impl Serialize for WireCheckpoint<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.key_field, &self.checkpoint.primary_key)?;
        map.serialize_entry(SERVER_TIMESTAMP_PARAM, &self.checkpoint.server_timestamp)?;
        map.end()
    }
}
