//! Entity store, its builder, and the read-modify-write cycle behind every
//! operation.

use crate::backend::FileBackend;
use crate::defaults::Defaults;
use crate::document::Document;
use crate::durability::Durability;
use crate::entity::{kind_of, Delta, Entity, Fields, CREATED_AT, ID, UPDATED_AT};
use crate::error::{Error, Result};
use crate::lock::{CollectionLock, CollectionLocks};
use crate::models::Car;
use crate::serializer::JsonSerializer;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace, warn};

/// Persistent collection of `T` backed by one JSON file.
///
/// Nothing is cached: every call takes the collection lock, re-reads the whole
/// file, applies one change, and writes the whole file back before releasing
/// the lock. Records are loaded and written back as raw JSON objects; `T` is
/// only built for what gets returned, so records a call doesn't touch are
/// written back exactly as they were read. Handles are cheap to clone, and all handles on the same file
/// share one lock (see [`CollectionLocks`]), so concurrent callers can't lose
/// each other's updates.
///
/// Operations must run inside a tokio runtime; the write step is spawned so
/// it finishes even if the caller's future is dropped.
pub struct EntityStore<T> {
    pub(crate) name: String,
    pub(crate) backend: FileBackend,
    pub(crate) defaults: Arc<Defaults>,
    pub(crate) lock: CollectionLock,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityStore<T> {
    /// Store at `path` with no defaults, pretty JSON and fsync'd writes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder(path).build()
    }

    /// Start configuring a store. Call [`.build()`](EntityStoreBuilder::build)
    /// when ready.
    pub fn builder(path: impl AsRef<Path>) -> EntityStoreBuilder<T> {
        EntityStoreBuilder::new(path)
    }

    // ---- reads ----

    /// Every entity, in stored order. A read failure is an error, never an
    /// empty list.
    ///
    /// A record that can't be viewed as `T` (say, its `createdAt` isn't a
    /// timestamp) is skipped with a warning. It stays in the file.
    pub async fn list(&self) -> Result<Vec<T>> {
        let (_guard, doc) = self.read().await?;
        let mut entities = Vec::with_capacity(doc.items.len());
        for fields in doc.items {
            let id = fields.get(ID).cloned().unwrap_or(Value::Null);
            match T::from_fields(fields) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(
                    collection = %self.name,
                    id = %id,
                    error = %e,
                    "skipping record that doesn't fit the entity type"
                ),
            }
        }
        Ok(entities)
    }

    /// The entity with `id`, or [`Error::NotFound`].
    pub async fn get_by_id(&self, id: &str) -> Result<T> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Like [`get_by_id`](Self::get_by_id) but absence is `Ok(None)`.
    pub async fn find(&self, id: &str) -> Result<Option<T>> {
        let (_guard, mut doc) = self.read().await?;
        match doc.position(id) {
            Some(pos) => T::from_fields(doc.items.swap_remove(pos)).map(Some),
            None => Ok(None),
        }
    }

    /// Number of entities.
    pub async fn len(&self) -> Result<usize> {
        let (_guard, doc) = self.read().await?;
        Ok(doc.items.len())
    }

    /// `true` when the collection holds nothing.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    // ---- writes ----

    /// Add a new entity built from `fields` (a JSON object).
    ///
    /// `id`, `createdAt` and `updatedAt` are assigned by the store; any values
    /// supplied for them are ignored. Absent or `null` fields are filled from
    /// the collection's default table. Values are stored as given; checking
    /// them is up to the caller. If the write fails nothing is committed;
    /// retry from scratch.
    pub async fn create(&self, fields: Value) -> Result<T> {
        let mut fields = into_object(fields)?;
        for key in [ID, CREATED_AT, UPDATED_AT] {
            fields.remove(key);
        }
        self.defaults.apply(&mut fields);

        let (guard, mut doc) = self.read().await?;
        let id = fresh_id(&doc);
        let now = timestamp(Utc::now())?;
        fields.insert(ID.into(), Value::String(id));
        fields.insert(CREATED_AT.into(), now.clone());
        fields.insert(UPDATED_AT.into(), now);
        let entity = T::from_fields(fields.clone())?;

        doc.items.push(fields);
        self.commit(guard, doc).await?;
        debug!(collection = %self.name, id = entity.id(), "created entity");
        Ok(entity)
    }

    /// Shallow-merge `fields` (a JSON object) over the entity with `id`.
    ///
    /// Supplied fields replace prior values wholesale, others are left alone.
    /// Attempts to change `id` or `createdAt` are dropped without error.
    pub async fn update(&self, id: &str, fields: Value) -> Result<T> {
        let patch = into_object(fields)?;
        let updated = self
            .modify(id, |obj| {
                for (key, value) in patch {
                    if key == ID || key == CREATED_AT {
                        trace!(field = %key, "ignoring write to immutable field");
                        continue;
                    }
                    obj.insert(key, value);
                }
                Ok(())
            })
            .await?;
        debug!(collection = %self.name, id, "updated entity");
        Ok(updated)
    }

    /// Remove the entity with `id`. Returns whether anything was removed; the
    /// file is only rewritten when it was.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let (guard, mut doc) = self.read().await?;
        let Some(pos) = doc.position(id) else {
            return Ok(false);
        };
        doc.items.remove(pos);
        self.commit(guard, doc).await?;
        debug!(collection = %self.name, id, "deleted entity");
        Ok(true)
    }

    /// Add each delta to its numeric field, all or nothing.
    ///
    /// Counters accumulate across calls, so concurrent increments all land.
    /// A missing or `null` field starts from zero; a non-numeric one is
    /// [`Error::NotNumeric`].
    ///
    /// ```rust,no_run
    /// # use json_collections::{EntityStore, Record};
    /// # async fn demo(store: EntityStore<Record>, id: &str) -> json_collections::Result<()> {
    /// store
    ///     .increment_counters(id, &[("totalRentals", 1.into()), ("totalRevenue", 89.5.into())])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn increment_counters(&self, id: &str, deltas: &[(&str, Delta)]) -> Result<T> {
        let updated = self
            .modify(id, |obj| {
                for &(field, delta) in deltas {
                    if field == ID || field == CREATED_AT || field == UPDATED_AT {
                        return Err(Error::NotNumeric(field.to_string()));
                    }
                    let next = delta.apply(field, obj.get(field))?;
                    obj.insert(field.to_string(), next);
                }
                Ok(())
            })
            .await?;
        debug!(collection = %self.name, id, counters = deltas.len(), "incremented counters");
        Ok(updated)
    }

    // ---- accessors ----

    /// Collection name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path to the backing JSON file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    /// Default table applied by [`create`](Self::create).
    #[must_use]
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// How many times a corrupt file was replaced by an empty document.
    #[must_use]
    pub fn corrupt_recoveries(&self) -> u64 {
        self.backend.corrupt_recoveries()
    }

    // ---- internal ----

    async fn read(&self) -> Result<(OwnedMutexGuard<()>, Document<Fields>)> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let doc = self.backend.load().await?;
        Ok((guard, doc))
    }

    async fn modify<F>(&self, id: &str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Fields) -> Result<()>,
    {
        let (guard, mut doc) = self.read().await?;
        let pos = doc
            .position(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let mut fields = doc.items[pos].clone();
        apply(&mut fields)?;
        let created_at = fields
            .get(CREATED_AT)
            .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok());
        let now = match created_at {
            Some(created_at) => Utc::now().max(created_at),
            None => Utc::now(),
        };
        fields.insert(UPDATED_AT.into(), timestamp(now)?);
        let updated = T::from_fields(fields.clone())?;

        doc.items[pos] = fields;
        self.commit(guard, doc).await?;
        Ok(updated)
    }

    /// Persist `doc` and release `guard` from a spawned task, so a cancelled
    /// caller can't free the lock while the write is still in flight.
    async fn commit(&self, guard: OwnedMutexGuard<()>, mut doc: Document<Fields>) -> Result<()> {
        let backend = self.backend.clone();
        let write = tokio::spawn(async move {
            let result = backend.store(&mut doc).await;
            drop(guard);
            result
        });
        write.await.map_err(|e| Error::Io {
            kind: std::io::ErrorKind::Other,
            message: format!("write task did not complete: {e}"),
        })?
    }
}

impl EntityStore<Car> {
    /// Count one rental and its revenue against the car with `id`.
    pub async fn record_rental(&self, id: &str, amount: f64) -> Result<Car> {
        self.increment_counters(
            id,
            &[("totalRentals", Delta::Int(1)), ("totalRevenue", Delta::Float(amount))],
        )
        .await
    }
}

impl<T> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: self.backend.clone(),
            defaults: Arc::clone(&self.defaults),
            lock: Arc::clone(&self.lock),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for EntityStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("name", &self.name)
            .field("path", &self.backend.path())
            .field("defaults", &self.defaults.len())
            .finish_non_exhaustive()
    }
}

fn fresh_id(doc: &Document<Fields>) -> String {
    loop {
        let id = uuid::Uuid::new_v4().to_string();
        if doc.position(&id).is_none() {
            return id;
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> Result<Value> {
    serde_json::to_value(at).map_err(|e| Error::Serialize(e.to_string()))
}

fn into_object(fields: Value) -> Result<Fields> {
    match fields {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidFields(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and opens an [`EntityStore`].
///
/// ```rust,no_run
/// use json_collections::{Durability, EntityStore, Record, Defaults};
///
/// let store = EntityStore::<Record>::builder("data/cars.json")
///     .name("cars")
///     .defaults(Defaults::new().with("seats", 5))
///     .durability(Durability::Buffered)
///     .build()
///     .unwrap();
/// ```
pub struct EntityStoreBuilder<T> {
    path: PathBuf,
    name: Option<String>,
    defaults: Defaults,
    pretty: bool,
    durability: Durability,
    locks: Option<Arc<CollectionLocks>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityStoreBuilder<T> {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: None,
            defaults: Defaults::new(),
            pretty: true,
            durability: Durability::default(),
            locks: None,
            _marker: PhantomData,
        }
    }

    /// Name used in logs (default: the file stem).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Default table applied on create (default: empty).
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Indent the JSON on disk (default: true).
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Sync policy for writes (default: [`Durability::Fsync`]).
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Take collection locks from this table instead of the process-wide one.
    /// Only handles sharing a table exclude each other.
    pub fn locks(mut self, locks: Arc<CollectionLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Validate the configuration and return the store. Touches no files; the
    /// backing file is created on first use.
    pub fn build(self) -> Result<EntityStore<T>> {
        let Some(stem) = self.path.file_stem() else {
            return Err(Error::Config(format!(
                "collection path has no file name: {}",
                self.path.display()
            )));
        };
        let name = self
            .name
            .unwrap_or_else(|| stem.to_string_lossy().into_owned());
        let locks = self.locks.unwrap_or_else(CollectionLocks::global);
        let lock = locks.lock_for(&self.path);
        let serializer = if self.pretty {
            JsonSerializer::pretty()
        } else {
            JsonSerializer::compact()
        };

        Ok(EntityStore {
            name,
            backend: FileBackend::with_options(&self.path, serializer, self.durability),
            defaults: Arc::new(self.defaults),
            lock,
            _marker: PhantomData,
        })
    }
}

impl<T> std::fmt::Debug for EntityStoreBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStoreBuilder")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("pretty", &self.pretty)
            .field("durability", &self.durability)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::FAIL_RENAME;
    use crate::Record;
    use serde_json::json;

    #[tokio::test]
    async fn failed_write_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::<Record>::builder(dir.path().join("cars.json"))
            .locks(Arc::new(CollectionLocks::new()))
            .build()
            .unwrap();
        let car = store.create(json!({"make": "Kia"})).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        FAIL_RENAME.with(|f| f.set(true));
        let err = store
            .update(&car.id, json!({"make": "Audi"}))
            .await
            .unwrap_err();
        FAIL_RENAME.with(|f| f.set(false));

        assert!(err.is_io());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        assert_eq!(store.get_by_id(&car.id).await.unwrap().get("make"), Some(&json!("Kia")));
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(store.corrupt_recoveries(), 0);
    }
}
