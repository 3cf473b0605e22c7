//! Booking-admin entity kinds and their default tables.
//!
//! Every domain field is optional and forgiving: a missing field stays
//! `None` (and stays missing when serialized), and a value of the wrong type
//! is kept verbatim in `extra` instead of failing the record. Only `id`,
//! `createdAt` and `updatedAt` have to be well formed.

use crate::defaults::Defaults;
use crate::entity::{to_fields, Entity, Fields};
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Collection name for [`Car`].
pub const CARS: &str = "cars";
/// Collection name for [`Cruise`].
pub const CRUISES: &str = "cruises";
/// Collection name for [`User`].
pub const USERS: &str = "users";
/// Collection name for [`Admin`].
pub const ADMINS: &str = "admins";

/// Rental car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub price_per_day: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_rentals: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cruise sailing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cruise {
    pub id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ship_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub departure_port: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration_nights: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub price_per_person: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_bookings: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_bookings: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_spent: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Back-office account. Credentials are whatever the auth layer stores in
/// `extra`; this crate never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Car {
    /// Rentable unless explicitly marked otherwise.
    pub fn is_available(&self) -> bool {
        self.available != Some(false)
    }
}

impl Cruise {
    /// Bookable unless explicitly marked otherwise.
    pub fn is_available(&self) -> bool {
        self.available != Some(false)
    }
}

impl Admin {
    /// Allowed to sign in unless explicitly deactivated.
    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }
}

// A value of the wrong type reads as absent; `from_fields` then parks the
// raw value in `extra` so nothing is dropped.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

macro_rules! impl_entity {
    ($($ty:ty),*) => {$(
        impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn from_fields(fields: Fields) -> Result<Self> {
                let mut entity: Self = serde_json::from_value(Value::Object(fields.clone()))
                    .map_err(|e| Error::InvalidFields(e.to_string()))?;
                let kept = to_fields(&entity)?;
                for (key, value) in fields {
                    if !value.is_null() && !kept.contains_key(&key) {
                        entity.extra.insert(key, value);
                    }
                }
                Ok(entity)
            }
        }
    )*};
}

impl_entity!(Car, Cruise, User, Admin);

fn current_year() -> Value {
    Value::from(Utc::now().year())
}

/// Car defaults: current year, 5 seats, available, zeroed counters.
pub fn car_defaults() -> Defaults {
    Defaults::new()
        .with_fn("year", current_year)
        .with("seats", 5)
        .with("transmission", "automatic")
        .with("fuelType", "petrol")
        .with("pricePerDay", 0.0)
        .with("features", Value::Array(Vec::new()))
        .with("available", true)
        .with("totalRentals", 0)
        .with("totalRevenue", 0.0)
}

/// Cruise defaults: week-long, available, zeroed counters.
pub fn cruise_defaults() -> Defaults {
    Defaults::new()
        .with("destinations", Value::Array(Vec::new()))
        .with("durationNights", 7)
        .with("pricePerPerson", 0.0)
        .with("capacity", 0)
        .with("available", true)
        .with("totalBookings", 0)
        .with("totalRevenue", 0.0)
}

/// User defaults: active, zeroed counters.
pub fn user_defaults() -> Defaults {
    Defaults::new()
        .with("status", "active")
        .with("totalBookings", 0)
        .with("totalSpent", 0.0)
}

/// Admin defaults: plain admin role, active, never logged in.
pub fn admin_defaults() -> Defaults {
    Defaults::new()
        .with("role", "admin")
        .with("active", true)
        .with("lastLogin", Value::Null)
}
