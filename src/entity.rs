//! What a collection holds: the [`Entity`] trait and the schemaless [`Record`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-owned field: generated once, never changed.
pub const ID: &str = "id";
/// Store-owned field: set at creation, never changed.
pub const CREATED_AT: &str = "createdAt";
/// Store-owned field: set on every successful mutation.
pub const UPDATED_AT: &str = "updatedAt";

/// One stored record as it sits in the file: a JSON object.
pub type Fields = Map<String, Value>;

/// A typed view over stored records.
///
/// The store keeps and patches records in their raw [`Fields`] form and only
/// builds `T` when handing a record out, so a record that doesn't fit `T`
/// never costs the rest of the collection. The serialized form must be a
/// JSON object carrying `id`, `createdAt` and `updatedAt`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Unique identifier within the collection.
    fn id(&self) -> &str;

    /// Creation time.
    fn created_at(&self) -> DateTime<Utc>;

    /// Build the view from a stored record. Fails with
    /// [`InvalidFields`](crate::Error::InvalidFields) when the record can't
    /// be represented as `Self`.
    fn from_fields(fields: Fields) -> crate::Result<Self> {
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| crate::Error::InvalidFields(e.to_string()))
    }
}

/// Schemaless entity: the common fields plus whatever else was stored.
///
/// Lossless for any object, which makes it the safe choice for collections
/// whose shape isn't pinned down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier.
    pub id: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Every other field, sorted by key on disk.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Look up a domain field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Reinterpret as a typed entity.
    pub fn decode<T: Entity>(&self) -> crate::Result<T> {
        T::from_fields(to_fields(self)?)
    }
}

impl Entity for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Amount added to a counter by
/// [`increment_counters`](crate::EntityStore::increment_counters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// Integer step, keeps integer counters integral.
    Int(i64),
    /// Fractional step, e.g. revenue.
    Float(f64),
}

impl From<i64> for Delta {
    fn from(n: i64) -> Self {
        Delta::Int(n)
    }
}

impl From<i32> for Delta {
    fn from(n: i32) -> Self {
        Delta::Int(n.into())
    }
}

impl From<u32> for Delta {
    fn from(n: u32) -> Self {
        Delta::Int(n.into())
    }
}

impl From<f64> for Delta {
    fn from(n: f64) -> Self {
        Delta::Float(n)
    }
}

impl Delta {
    /// `current + self`. Missing or null counts as zero. Integer plus integer
    /// stays integral unless it overflows, then it goes float.
    pub(crate) fn apply(self, field: &str, current: Option<&Value>) -> crate::Result<Value> {
        let current = match current {
            None | Some(Value::Null) => return self.into_value(field),
            Some(Value::Number(n)) => n,
            Some(_) => return Err(crate::Error::NotNumeric(field.to_string())),
        };
        if let (Delta::Int(d), Some(c)) = (self, current.as_i64()) {
            if let Some(sum) = c.checked_add(d) {
                return Ok(Value::from(sum));
            }
        }
        let base = current
            .as_f64()
            .ok_or_else(|| crate::Error::NotNumeric(field.to_string()))?;
        float(field, base + self.as_f64())
    }

    fn as_f64(self) -> f64 {
        match self {
            Delta::Int(n) => n as f64,
            Delta::Float(n) => n,
        }
    }

    fn into_value(self, field: &str) -> crate::Result<Value> {
        match self {
            Delta::Int(n) => Ok(Value::from(n)),
            Delta::Float(n) => float(field, n),
        }
    }
}

/// Serialize an entity into its object form.
pub(crate) fn to_fields<T: Serialize>(entity: &T) -> crate::Result<Fields> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(crate::Error::Serialize(format!(
            "entity serialized to {}, not an object",
            kind_of(&other)
        ))),
        Err(e) => Err(crate::Error::Serialize(e.to_string())),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn float(field: &str, n: f64) -> crate::Result<Value> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| crate::Error::InvalidFields(format!("{field} would not be finite")))
}
