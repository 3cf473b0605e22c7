//! The unit of durability: one whole collection plus its last write time.

use crate::entity::{Fields, ID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything persisted for one collection.
///
/// The file on disk is always a complete serialization of this struct. There
/// is no delta or partial persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    /// Entities in insertion order.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Time of the last successful write, `None` until the first one.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Document<T> {
    /// A document with no entities that has never been written.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            last_updated: None,
        }
    }
}

impl Document<Fields> {
    /// Position of the record whose `id` is `id`, if any.
    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.get(ID).and_then(Value::as_str) == Some(id))
    }
}

impl<T> Default for Document<T> {
    fn default() -> Self {
        Self::empty()
    }
}
