use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use tracing::debug;

use crate::flights::{Flight, FlightModel, FlightStore, NewFlight, PilotReport, route_change};
use crate::web::PgPool;

#[derive(Clone)]
pub struct FlightsRepository {
    pool: PgPool,
}

impl FlightsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new open flight. Used by the scheduling back-office, not
    /// the protocol.
    pub async fn insert(&self, new_flight: NewFlight) -> Result<Flight> {
        use crate::schema::flights;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: FlightModel = diesel::insert_into(flights::table)
                .values(&new_flight)
                .returning(FlightModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<FlightModel, anyhow::Error>(model)
        })
        .await??;

        Ok(model.into())
    }
}

#[async_trait]
impl FlightStore for FlightsRepository {
    async fn list_open(&self) -> Result<Vec<Flight>> {
        use crate::schema::flights::dsl::*;

        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let models: Vec<FlightModel> = flights
                .filter(landing_rate.is_null())
                .filter(log.is_null())
                .order(id.asc())
                .select(FlightModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<FlightModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn get(&self, flight_id: i32) -> Result<Option<Flight>> {
        use crate::schema::flights::dsl::*;

        let pool = self.pool.clone();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<FlightModel> = flights
                .filter(id.eq(flight_id))
                .select(FlightModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<FlightModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }

    async fn list_completed(&self, newest_first: bool) -> Result<Vec<Flight>> {
        use crate::schema::flights::dsl::*;

        let pool = self.pool.clone();

        let models = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let query = flights
                .filter(landing_rate.is_not_null())
                .filter(log.is_not_null())
                .select(FlightModel::as_select());

            let models: Vec<FlightModel> = if newest_first {
                query.order(id.desc()).load(&mut conn)?
            } else {
                query.order(id.asc()).load(&mut conn)?
            };

            Ok::<Vec<FlightModel>, anyhow::Error>(models)
        })
        .await??;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn update_route(&self, flight: &Flight, submitted: Option<&str>) -> Result<()> {
        use crate::schema::flights::dsl::*;

        let Some(new_route) = route_change(&flight.route, submitted) else {
            return Ok(());
        };

        let pool = self.pool.clone();
        let flight_id = flight.id;
        let new_route = new_route.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            debug!(flight_id, "updating route");
            diesel::update(flights.filter(id.eq(flight_id)))
                .set(route.eq(&new_route))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn file_report(&self, flight_id: i32, report: &PilotReport) -> Result<()> {
        use crate::schema::flights::dsl::*;

        let pool = self.pool.clone();
        let report = report.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(flights.filter(id.eq(flight_id)))
                .set((
                    log.eq(&Some(report.log)),
                    comments.eq(&report.comments),
                    landing_rate.eq(&Some(report.landing_rate)),
                    duration.eq(&Some(report.duration)),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
