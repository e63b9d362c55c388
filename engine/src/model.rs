use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::collection::{Collection, Record};
use crate::error::{Result, StoreError};

/// A stat entered either as a number or as free text ("12", "3/2", 14).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(Number),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl fmt::Display for Attack {
    /// `Bite +4 (1d6+2 piercing) grapples on hit`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or(""))?;
        if let Some(m) = self.modifier.as_deref().filter(|m| !m.is_empty()) {
            write!(f, " +{m}")?;
        }
        write!(
            f,
            " ({} {})",
            self.damage.as_deref().unwrap_or(""),
            self.damage_type.as_deref().unwrap_or("")
        )?;
        if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
            write!(f, " {note}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Challenge rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perception: Option<Scalar>,
    /// Hit points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<Scalar>,
    /// Defense value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vd: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ce: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Scalar>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reflex: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vig: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vol: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immunities: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attacks: Vec<Attack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A typed view over the records of one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    fn created_at(&self) -> Option<i64>;
    fn set_created_at(&mut self, at: i64);
    fn set_updated_at(&mut self, at: i64);

    fn to_record(&self) -> Result<Record> {
        let value = serde_json::to_value(self)
            .map_err(|e| StoreError::invalid_format(e.to_string()))?;
        Record::try_from(value)
    }

    fn from_record(record: Record) -> Result<Self> {
        serde_json::from_value(Value::Object(record.into_fields())).map_err(|e| {
            StoreError::invalid_format(format!("record is not a valid {}: {e}", Self::COLLECTION))
        })
    }
}

macro_rules! entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> Option<&str> {
                self.id.as_deref().filter(|id| !id.is_empty())
            }

            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }

            fn created_at(&self) -> Option<i64> {
                self.created_at
            }

            fn set_created_at(&mut self, at: i64) {
                self.created_at = Some(at);
            }

            fn set_updated_at(&mut self, at: i64) {
                self.updated_at = Some(at);
            }
        }
    };
}

entity!(Npc, Collection::Npcs);
entity!(Combat, Collection::Combats);

/// Newest first by creation time, entries without a timestamp last, at most `limit`.
pub fn most_recent<T>(mut items: Vec<T>, limit: usize, created_at: impl Fn(&T) -> Option<i64>) -> Vec<T> {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items.truncate(limit);
    items
}
