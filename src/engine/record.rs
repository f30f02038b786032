use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

/// Reserved field holding a record's unique identifier.
pub const ID_FIELD: &str = "_id";

/// A single schema-less record: a JSON object of named fields.
///
/// There is no schema in Tabula Store; any valid JSON object is a valid
/// record. Every record stored inside a [`Store`](crate::Store) carries a
/// non-empty string under [`ID_FIELD`]; one is generated on insertion if the
/// caller did not provide it. Once set, the identifier is never reassigned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::Internal(format!(
                "record must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the record's identifier, if it carries a non-empty one.
    pub fn id(&self) -> Option<&str> {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    /// Ensures the record carries an identifier, generating a random 128-bit
    /// hex token when absent. Returns the (possibly fresh) identifier.
    pub fn ensure_id(&mut self) -> String {
        if let Some(id) = self.id() {
            return id.to_string();
        }
        let id = Uuid::new_v4().simple().to_string();
        self.fields
            .insert(ID_FIELD.to_string(), Value::String(id.clone()));
        id
    }

    /// Overlays `patch` onto this record, field by field. The identifier
    /// field is skipped: identifiers are never reassigned.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (field, value) in patch {
            if field == ID_FIELD {
                continue;
            }
            self.fields.insert(field.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl std::ops::Index<&str> for Record {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.fields
            .get(field)
            .unwrap_or_else(|| panic!("no field `{field}` in record"))
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
