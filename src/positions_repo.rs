use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;

use crate::positions::{NewPosition, NewPositionModel, Position, PositionLog, PositionModel};
use crate::web::PgPool;

#[derive(Clone)]
pub struct PositionsRepository {
    pool: PgPool,
}

impl PositionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The full position log for a flight in report order. Read by the
    /// flight-history website, not the protocol.
    pub async fn list_for_flight(&self, flight_id_value: i32) -> Result<Vec<Position>> {
        use crate::schema::positions::dsl::*;

        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let models: Vec<PositionModel> = positions
                .filter(flight_id.eq(flight_id_value))
                .order(timestamp.asc())
                .select(PositionModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<PositionModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

#[async_trait]
impl PositionLog for PositionsRepository {
    async fn append(&self, sample: NewPosition) -> Result<Position> {
        use crate::schema::positions;

        let pool = self.pool.clone();
        let model: NewPositionModel = sample.into();

        let inserted = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: PositionModel = diesel::insert_into(positions::table)
                .values(&model)
                .returning(PositionModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<PositionModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(inserted.into())
    }
}
