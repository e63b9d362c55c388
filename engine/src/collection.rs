use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// The named collections a database document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Npcs,
    Combats,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Npcs, Collection::Combats];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Npcs => "npcs",
            Collection::Combats => "combats",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// One stored entry: a JSON object whose `id` field identifies it.
///
/// Fields the typed views do not know about are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record id, if it is a non-empty string.
    pub fn id(&self) -> Option<&str> {
        match self.0.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    /// The id as supplied by a caller: `None` when absent, null or empty.
    /// An id of any other type is an error.
    pub fn supplied_id(&self) -> Result<Option<&str>> {
        match self.0.get("id") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok((!id.is_empty()).then_some(id.as_str())),
            Some(other) => Err(StoreError::invalid_format(format!(
                "record id must be a string, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn created_at(&self) -> Option<i64> {
        self.0.get("createdAt").and_then(Value::as_i64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::invalid_format(format!(
                "expected a record object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// The full state of the database: one insertion-ordered sequence per collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub npcs: Vec<Record>,
    pub combats: Vec<Record>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Npcs => &self.npcs,
            Collection::Combats => &self.combats,
        }
    }

    pub fn records_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Npcs => &mut self.npcs,
            Collection::Combats => &mut self.combats,
        }
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.records(collection).len()
    }

    /// Parse an imported document.
    ///
    /// The document must be an object holding every known collection name
    /// mapped to an array. Entries that are not objects are dropped, as are
    /// extra top-level keys.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_value(parse_json(text)?)
    }

    /// Parse a document read back from storage. Missing collections start empty.
    pub fn parse_stored(text: &str) -> Result<Self> {
        Self::from_value_with(parse_json(text)?, Missing::Empty)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Self::from_value_with(value, Missing::Reject)
    }

    fn from_value_with(value: Value, missing: Missing) -> Result<Self> {
        let mut root = match value {
            Value::Object(root) => root,
            other => {
                return Err(StoreError::invalid_format(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut snapshot = Snapshot::empty();
        for collection in Collection::ALL {
            let entries = match root.remove(collection.as_str()) {
                Some(Value::Array(entries)) => entries,
                Some(other) => {
                    return Err(StoreError::invalid_format(format!(
                        "\"{}\" must be an array, got {}",
                        collection,
                        json_kind(&other)
                    )));
                }
                None if missing == Missing::Empty => {
                    debug!(%collection, "collection missing from document, starting empty");
                    continue;
                }
                None => {
                    return Err(StoreError::invalid_format(format!(
                        "missing collection \"{collection}\""
                    )));
                }
            };
            let total = entries.len();
            let records: Vec<Record> = entries
                .into_iter()
                .filter_map(|entry| Record::try_from(entry).ok())
                .collect();
            if records.len() != total {
                warn!(
                    %collection,
                    dropped = total - records.len(),
                    "dropped entries that are not objects"
                );
            }
            *snapshot.records_mut(collection) = records;
        }
        Ok(snapshot)
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Storage(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Reject,
    Empty,
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::invalid_format(format!("not valid JSON: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
