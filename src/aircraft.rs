use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// An aircraft in the fleet catalog. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aircraft {
    pub id: i32,
    pub icao: String,
    pub name: String,
    pub registration: String,
    pub max_passengers: i32,
    pub max_cargo: i32,
}

/// Diesel model for the aircraft table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::aircraft)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AircraftModel {
    pub id: i32,
    pub icao: String,
    pub name: String,
    pub registration: String,
    pub max_passengers: i32,
    pub max_cargo: i32,
}

/// Insert model used by the catalog import and by tests
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::aircraft)]
pub struct NewAircraft {
    pub icao: String,
    pub name: String,
    pub registration: String,
    pub max_passengers: i32,
    pub max_cargo: i32,
}

impl From<AircraftModel> for Aircraft {
    fn from(model: AircraftModel) -> Self {
        Self {
            id: model.id,
            icao: model.icao,
            name: model.name,
            registration: model.registration,
            max_passengers: model.max_passengers,
            max_cargo: model.max_cargo,
        }
    }
}

/// Read-only fleet view the dispatcher consumes.
#[async_trait]
pub trait AircraftCatalog: Send + Sync {
    /// The whole fleet in id order.
    async fn list(&self) -> Result<Vec<Aircraft>>;

    async fn get(&self, id: i32) -> Result<Option<Aircraft>>;
}
