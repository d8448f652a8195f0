use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A scheduled flight and, once flown, its pilot report.
///
/// The lifecycle is monotonic: a flight is created open (no duration, log
/// or landing rate), accumulates route changes and position reports while
/// it is being flown, and is completed when the pilot report is filed.
/// Filing is the only path that sets the completion fields, and nothing in
/// this crate clears them again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: i32,
    pub airline_icao: String,
    pub flight_number: i32,
    /// Departure airport (foreign key to airports)
    pub origin_id: i32,
    /// Arrival airport (foreign key to airports)
    pub destination_id: i32,
    pub route: String,
    /// Cruise level in flight levels (hundreds of feet)
    pub flight_level: i32,
    pub aircraft_id: i32,
    /// Block time in minutes, set when the pilot report is filed
    pub duration: Option<i32>,
    /// Touchdown rate in feet per minute, set when the pilot report is filed
    pub landing_rate: Option<i32>,
    /// Client-generated flight log, set when the pilot report is filed
    pub log: Option<String>,
    pub comments: Option<String>,
}

impl Flight {
    /// Open flights are the ones offered for bidding; flown ones carry a
    /// landing rate and a log.
    pub fn is_open(&self) -> bool {
        self.landing_rate.is_none() && self.log.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.landing_rate.is_some() && self.log.is_some()
    }
}

/// Completion fields written when a pilot report is filed.
#[derive(Debug, Clone)]
pub struct PilotReport {
    pub log: String,
    pub comments: Option<String>,
    pub landing_rate: i32,
    /// Block time in minutes
    pub duration: i32,
}

/// The route value that should be written, if any. Clients resubmit the
/// route with every report; an absent or unchanged value must not cause a
/// write.
pub fn route_change<'a>(current: &str, submitted: Option<&'a str>) -> Option<&'a str> {
    match submitted {
        Some(submitted) if submitted != current => Some(submitted),
        _ => None,
    }
}

/// Diesel model for the flights table
#[derive(Debug, Clone, Queryable, Selectable, AsChangeset)]
#[diesel(table_name = crate::schema::flights)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FlightModel {
    pub id: i32,
    pub airline_icao: String,
    pub flight_number: i32,
    pub origin_id: i32,
    pub destination_id: i32,
    pub route: String,
    pub flight_level: i32,
    pub aircraft_id: i32,
    pub duration: Option<i32>,
    pub landing_rate: Option<i32>,
    pub log: Option<String>,
    pub comments: Option<String>,
}

/// Insert model used by the scheduling back-office and by tests
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::flights)]
pub struct NewFlight {
    pub airline_icao: String,
    pub flight_number: i32,
    pub origin_id: i32,
    pub destination_id: i32,
    pub route: String,
    pub flight_level: i32,
    pub aircraft_id: i32,
}

impl From<FlightModel> for Flight {
    fn from(model: FlightModel) -> Self {
        Self {
            id: model.id,
            airline_icao: model.airline_icao,
            flight_number: model.flight_number,
            origin_id: model.origin_id,
            destination_id: model.destination_id,
            route: model.route,
            flight_level: model.flight_level,
            aircraft_id: model.aircraft_id,
            duration: model.duration,
            landing_rate: model.landing_rate,
            log: model.log,
            comments: model.comments,
        }
    }
}

/// Storage seam for flights. The dispatcher only sees this trait, so tests
/// can substitute an in-memory store.
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Flights still open for bidding, in id order.
    async fn list_open(&self) -> Result<Vec<Flight>>;

    async fn get(&self, id: i32) -> Result<Option<Flight>>;

    /// Flights with a filed report. `newest_first` orders by id descending.
    async fn list_completed(&self, newest_first: bool) -> Result<Vec<Flight>>;

    /// Persist a route change when `submitted` is present and differs from
    /// the flight's current route.
    async fn update_route(&self, flight: &Flight, submitted: Option<&str>) -> Result<()>;

    /// File the pilot report, completing the flight. Last writer wins if
    /// two reports race on the same flight.
    async fn file_report(&self, flight_id: i32, report: &PilotReport) -> Result<()>;
}
