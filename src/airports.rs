use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A reference airport, unique by ICAO code.
///
/// Rows are maintained by the external catalog import; the dispatcher only
/// reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub id: i32,
    pub icao: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

/// Diesel model for the airports table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::airports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AirportModel {
    pub id: i32,
    pub icao: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

/// Insert model used by the catalog import and by tests
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::airports)]
pub struct NewAirport {
    pub icao: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

impl From<AirportModel> for Airport {
    fn from(model: AirportModel) -> Self {
        Self {
            id: model.id,
            icao: model.icao,
            name: model.name,
            latitude: model.latitude,
            longitude: model.longitude,
            country: model.country,
        }
    }
}

/// Read-only catalog view the dispatcher consumes.
#[async_trait]
pub trait AirportCatalog: Send + Sync {
    /// All airports in id order.
    async fn list(&self) -> Result<Vec<Airport>>;

    async fn get(&self, id: i32) -> Result<Option<Airport>>;
}
