//! Replicated document envelope

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::Schema;
use crate::sync::{Checkpoint, ServerTimestamp};

/// Wire name of the tombstone flag
pub const DELETED_FIELD: &str = "_deleted";

/// Wire name of the store-assigned revision timestamp
pub const SERVER_TIMESTAMP_FIELD: &str = "serverTimestamp";

/// A schema record plus the replication envelope.
///
/// On the wire the schema fields, `_deleted` and `serverTimestamp` share one
/// flat JSON object. `_deleted` is required. `serverTimestamp` is only ever
/// assigned by the store: a client-supplied value is parsed and then ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub data: T,
    pub deleted: bool,
    pub server_timestamp: Option<ServerTimestamp>,
}

impl<T: Schema> Document<T> {
    /// Create a live (non-deleted) document that has not been stored yet
    pub const fn new(data: T) -> Self {
        Self {
            data,
            deleted: false,
            server_timestamp: None,
        }
    }

    /// Same record, flagged as deleted
    #[must_use]
    pub fn tombstone(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn primary_key(&self) -> &str {
        self.data.primary_key()
    }

    /// Structural equality over everything the protocol tracks.
    ///
    /// `serverTimestamp` is excluded: clients may echo a stale or missing one.
    pub fn same_state(&self, other: &Self) -> bool {
        self.deleted == other.deleted && self.data == other.data
    }

    /// Resume position just after this document, once it has been stored
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.server_timestamp
            .map(|server_timestamp| Checkpoint::new(self.primary_key(), server_timestamp))
    }
}

impl<T: Serialize> Serialize for Document<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Value::Object(mut fields) = serde_json::to_value(&self.data).map_err(S::Error::custom)?
        else {
            return Err(S::Error::custom("document schema must serialize to an object"));
        };
        fields.insert(DELETED_FIELD.to_string(), Value::Bool(self.deleted));
        if let Some(server_timestamp) = self.server_timestamp {
            fields.insert(
                SERVER_TIMESTAMP_FIELD.to_string(),
                Value::String(server_timestamp.to_string()),
            );
        }
        fields.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Document<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;

        let deleted = match fields.remove(DELETED_FIELD) {
            Some(Value::Bool(deleted)) => deleted,
            Some(_) => return Err(D::Error::custom("`_deleted` must be a boolean")),
            None => return Err(D::Error::missing_field(DELETED_FIELD)),
        };
        let server_timestamp = fields
            .remove(SERVER_TIMESTAMP_FIELD)
            .filter(|value| !value.is_null())
            .map(ServerTimestamp::deserialize)
            .transpose()
            .map_err(D::Error::custom)?;
        let data = T::deserialize(Value::Object(fields)).map_err(D::Error::custom)?;

        Ok(Self {
            data,
            deleted,
            server_timestamp,
        })
    }
}
