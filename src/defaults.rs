//! Per-collection default-value tables, consulted once at create time.

use serde_json::{Map, Value};

/// Where a default comes from.
#[derive(Clone)]
pub enum FieldDefault {
    /// Fixed value.
    Value(Value),
    /// Computed when the entity is created (e.g. the current year).
    Computed(fn() -> Value),
}

impl FieldDefault {
    /// Produce the value.
    pub fn resolve(&self) -> Value {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Computed(f) => f(),
        }
    }
}

impl std::fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldDefault::Value(v) => write!(f, "{v}"),
            FieldDefault::Computed(_) => f.write_str("<computed>"),
        }
    }
}

/// Ordered `field -> default` table.
///
/// ```
/// use json_collections::Defaults;
/// use serde_json::json;
///
/// let defaults = Defaults::new().with("seats", 5).with("available", true);
/// let mut fields = json!({"seats": 7}).as_object().cloned().unwrap();
/// defaults.apply(&mut fields);
/// assert_eq!(fields["seats"], json!(7));
/// assert_eq!(fields["available"], json!(true));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    entries: Vec<(String, FieldDefault)>,
}

impl Defaults {
    /// Empty table: create stores exactly what it is given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a constant default.
    pub fn with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field.into(), FieldDefault::Value(value.into()))
    }

    /// Add (or replace) a default computed at create time.
    pub fn with_fn(self, field: impl Into<String>, f: fn() -> Value) -> Self {
        self.set(field.into(), FieldDefault::Computed(f))
    }

    fn set(mut self, field: String, default: FieldDefault) -> Self {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = default,
            None => self.entries.push((field, default)),
        }
        self
    }

    /// Fill every field that is absent or `null`. Supplied values win,
    /// including `false` and `0`.
    pub fn apply(&self, fields: &mut Map<String, Value>) {
        for (name, default) in &self.entries {
            match fields.get(name) {
                Some(v) if !v.is_null() => {}
                _ => {
                    fields.insert(name.clone(), default.resolve());
                }
            }
        }
    }

    /// Resolve the default for one field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, d)| d.resolve())
    }

    /// Field names in table order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of fields with a default.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
