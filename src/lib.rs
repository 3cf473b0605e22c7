//! Crash-safe JSON collections for the booking admin backend.
//!
//! Each collection (cars, cruises, users, admins) is one pretty-printed JSON
//! file, `{ "items": [...], "lastUpdated": ... }`. Every operation takes a
//! per-file lock, re-reads the file, applies one change and writes it back via
//! temp file + rename, so concurrent requests never lose updates and a crash
//! never leaves a half-written file.
//!
//! ```rust,no_run
//! use json_collections::CollectionRegistry;
//! use serde_json::json;
//!
//! # async fn demo() -> json_collections::Result<()> {
//! let registry = CollectionRegistry::standard("data");
//! let cars = registry.cars()?;
//! let car = cars.create(json!({"make": "Toyota", "model": "Camry"})).await?;
//! assert!(car.is_available());
//! cars.update(&car.id, json!({"pricePerDay": 50})).await?;
//! # Ok(())
//! # }
//! ```
//!
//! A file that can't be decoded is moved aside and replaced by an empty
//! collection instead of failing every request. That is data loss, so it is
//! logged at `error` and counted by
//! [`EntityStore::corrupt_recoveries`]. A single record that doesn't match its
//! typed model is not corruption: the typed views keep odd values in `extra`.
//!
//! **Single-process only.** Locks live in memory. If multiple processes open
//! the same file they will clobber each other.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod defaults;
pub mod document;
pub mod durability;
pub mod entity;
pub mod error;
pub mod lock;
#[allow(missing_docs)]
pub mod models;
pub mod persist;
pub mod registry;
pub mod serializer;
pub mod store;

pub use backend::FileBackend;
pub use defaults::{Defaults, FieldDefault};
pub use document::Document;
pub use durability::Durability;
pub use entity::{Delta, Entity, Fields, Record};
pub use error::{Error, Result};
pub use lock::CollectionLocks;
pub use models::{Admin, Car, Cruise, User};
pub use registry::{CollectionRegistry, CollectionSpec};
pub use serializer::{JsonSerializer, Serializer};
pub use store::{EntityStore, EntityStoreBuilder};
