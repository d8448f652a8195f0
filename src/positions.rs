use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A single telemetry sample in a flight's position log. Append-only,
/// ordered by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: i32,
    pub flight_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in feet
    pub altitude: i32,
    /// Magnetic heading in degrees
    pub heading: i32,
    /// Ground speed in knots
    pub ground_speed: i32,
    /// Flight phase reported by the client; null when the report carried
    /// no phase field at all.
    pub phase: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// A normalized sample ready to be appended.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub flight_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub heading: i32,
    pub ground_speed: i32,
    pub phase: Option<i32>,
}

/// Diesel model for the positions table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::positions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PositionModel {
    pub id: i32,
    pub flight_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub heading: i32,
    pub ground_speed: i32,
    pub phase: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::positions)]
pub struct NewPositionModel {
    pub flight_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
    pub heading: i32,
    pub ground_speed: i32,
    pub phase: Option<i32>,
}

impl From<PositionModel> for Position {
    fn from(model: PositionModel) -> Self {
        Self {
            id: model.id,
            flight_id: model.flight_id,
            latitude: model.latitude,
            longitude: model.longitude,
            altitude: model.altitude,
            heading: model.heading,
            ground_speed: model.ground_speed,
            phase: model.phase,
            timestamp: model.timestamp,
        }
    }
}

impl From<NewPosition> for NewPositionModel {
    fn from(sample: NewPosition) -> Self {
        Self {
            flight_id: sample.flight_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
            heading: sample.heading,
            ground_speed: sample.ground_speed,
            phase: sample.phase,
        }
    }
}

/// Append-only storage for telemetry samples.
#[async_trait]
pub trait PositionLog: Send + Sync {
    /// Append one sample; existing rows are never rewritten.
    async fn append(&self, sample: NewPosition) -> Result<Position>;
}
