//! Collection registry: one row per entity kind, one generic store for all.

use crate::defaults::Defaults;
use crate::durability::Durability;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::lock::CollectionLocks;
use crate::models::{self, Admin, Car, Cruise, User};
use crate::store::EntityStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One registry row: where a collection lives and how new entities are
/// filled in.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    name: String,
    file: PathBuf,
    defaults: Defaults,
}

impl CollectionSpec {
    /// Row stored at `<data dir>/<name>.json` with no defaults.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let file = PathBuf::from(format!("{name}.json"));
        Self {
            name,
            file,
            defaults: Defaults::new(),
        }
    }

    /// Override the file, relative to the data dir (absolute paths are used
    /// as-is).
    pub fn file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = file.as_ref().to_path_buf();
        self
    }

    /// Default table applied on create.
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Maps collection names to their files and default tables.
///
/// ```rust,no_run
/// use json_collections::CollectionRegistry;
/// use serde_json::json;
///
/// # async fn demo() -> json_collections::Result<()> {
/// let registry = CollectionRegistry::standard("data");
/// let cars = registry.cars()?;
/// let car = cars.create(json!({"make": "Toyota", "model": "Camry"})).await?;
/// cars.record_rental(&car.id, 120.0).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CollectionRegistry {
    data_dir: PathBuf,
    specs: BTreeMap<String, CollectionSpec>,
    pretty: bool,
    durability: Durability,
    locks: Arc<CollectionLocks>,
}

impl CollectionRegistry {
    /// Empty registry rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            specs: BTreeMap::new(),
            pretty: true,
            durability: Durability::default(),
            locks: CollectionLocks::global(),
        }
    }

    /// Registry with the booking collections: cars, cruises, users, admins.
    pub fn standard(data_dir: impl AsRef<Path>) -> Self {
        let mut registry = Self::new(data_dir);
        for spec in [
            CollectionSpec::new(models::CARS).defaults(models::car_defaults()),
            CollectionSpec::new(models::CRUISES).defaults(models::cruise_defaults()),
            CollectionSpec::new(models::USERS).defaults(models::user_defaults()),
            CollectionSpec::new(models::ADMINS).defaults(models::admin_defaults()),
        ] {
            registry.specs.insert(spec.name.clone(), spec);
        }
        registry
    }

    /// Add a row. Names must be unique.
    pub fn register(&mut self, spec: CollectionSpec) -> Result<()> {
        if self.specs.contains_key(&spec.name) {
            return Err(Error::Config(format!(
                "collection already registered: {}",
                spec.name
            )));
        }
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Indent JSON in every store opened from here (default: true).
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Sync policy for every store opened from here.
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Lock table for every store opened from here (default: the global one).
    pub fn locks(mut self, locks: Arc<CollectionLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Open the collection called `name` as entities of type `T`.
    pub fn open<T: Entity>(&self, name: &str) -> Result<EntityStore<T>> {
        let spec = self.spec(name)?;
        EntityStore::builder(self.data_dir.join(&spec.file))
            .name(spec.name.clone())
            .defaults(spec.defaults.clone())
            .pretty(self.pretty)
            .durability(self.durability)
            .locks(Arc::clone(&self.locks))
            .build()
    }

    /// The cars collection.
    pub fn cars(&self) -> Result<EntityStore<Car>> {
        self.open(models::CARS)
    }

    /// The cruises collection.
    pub fn cruises(&self) -> Result<EntityStore<Cruise>> {
        self.open(models::CRUISES)
    }

    /// The users collection.
    pub fn users(&self) -> Result<EntityStore<User>> {
        self.open(models::USERS)
    }

    /// The admins collection.
    pub fn admins(&self) -> Result<EntityStore<Admin>> {
        self.open(models::ADMINS)
    }

    /// Backing file of `name`.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.data_dir.join(&self.spec(name)?.file))
    }

    /// `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Root directory for relative collection files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn spec(&self, name: &str) -> Result<&CollectionSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown collection: {name}")))
    }
}
