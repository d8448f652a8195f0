use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;

use crate::aircraft::{Aircraft, AircraftCatalog, AircraftModel, NewAircraft};
use crate::web::PgPool;

#[derive(Clone)]
pub struct AircraftRepository {
    pool: PgPool,
}

impl AircraftRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new aircraft. Used by the catalog import, not the protocol.
    pub async fn insert(&self, new_aircraft: NewAircraft) -> Result<Aircraft> {
        use crate::schema::aircraft;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: AircraftModel = diesel::insert_into(aircraft::table)
                .values(&new_aircraft)
                .returning(AircraftModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<AircraftModel, anyhow::Error>(model)
        })
        .await??;

        Ok(model.into())
    }
}

#[async_trait]
impl AircraftCatalog for AircraftRepository {
    async fn list(&self) -> Result<Vec<Aircraft>> {
        use crate::schema::aircraft::dsl::*;

        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let models: Vec<AircraftModel> = aircraft
                .order(id.asc())
                .select(AircraftModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<AircraftModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn get(&self, aircraft_id: i32) -> Result<Option<Aircraft>> {
        use crate::schema::aircraft::dsl::*;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<AircraftModel> = aircraft
                .filter(id.eq(aircraft_id))
                .select(AircraftModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<AircraftModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }
}
