use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;

use crate::airports::{Airport, AirportCatalog, AirportModel, NewAirport};
use crate::web::PgPool;

#[derive(Clone)]
pub struct AirportsRepository {
    pool: PgPool,
}

impl AirportsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new airport. Used by the catalog import, not the protocol.
    pub async fn insert(&self, new_airport: NewAirport) -> Result<Airport> {
        use crate::schema::airports;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: AirportModel = diesel::insert_into(airports::table)
                .values(&new_airport)
                .returning(AirportModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<AirportModel, anyhow::Error>(model)
        })
        .await??;

        Ok(model.into())
    }

    /// Look up an airport by its ICAO code.
    pub async fn get_by_icao(&self, icao_code: &str) -> Result<Option<Airport>> {
        use crate::schema::airports::dsl::*;

        let pool = self.pool.clone();
        let icao_code = icao_code.to_string();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<AirportModel> = airports
                .filter(icao.eq(&icao_code))
                .select(AirportModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<AirportModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }
}

#[async_trait]
impl AirportCatalog for AirportsRepository {
    async fn list(&self) -> Result<Vec<Airport>> {
        use crate::schema::airports::dsl::*;

        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let models: Vec<AirportModel> = airports
                .order(id.asc())
                .select(AirportModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<AirportModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn get(&self, airport_id: i32) -> Result<Option<Airport>> {
        use crate::schema::airports::dsl::*;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<AirportModel> = airports
                .filter(id.eq(airport_id))
                .select(AirportModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<AirportModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }
}
