//! Telemetry ingestion: numeric normalization applied to raw position
//! reports before they are appended to a flight's position log.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::flights::Flight;
use crate::positions::{NewPosition, Position, PositionLog};

/// Coordinates closer to zero than this are snapped to exactly zero. Some
/// clients emit sub-degree noise instead of a true zero when no position is
/// available; the boundary itself is exclusive and survives untouched.
/// Compatibility workaround, not a protocol feature.
const COORDINATE_SNAP_LIMIT: f64 = 0.005;

/// One raw position report as received from the wire. `None` means the
/// field was not present at all, which is distinct from an empty value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSample<'a> {
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
    pub altitude: Option<&'a str>,
    pub heading: Option<&'a str>,
    pub ground_speed: Option<&'a str>,
    pub phase: Option<&'a str>,
}

/// Parse a coordinate that may use `,` as the decimal separator, snapping
/// near-zero noise to exactly zero. Absent and malformed values read as
/// zero.
pub fn parse_coordinate(raw: Option<&str>) -> f64 {
    let text = raw.unwrap_or("0").replace(',', ".");
    let value = match text.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            warn!(raw = ?raw, "unparseable coordinate, storing 0");
            0.0
        }
    };

    if value < COORDINATE_SNAP_LIMIT && value > -COORDINATE_SNAP_LIMIT {
        0.0
    } else {
        value
    }
}

/// Parse an integer field, treating an absent or malformed value as zero.
pub fn parse_integer(raw: Option<&str>) -> i32 {
    match raw.unwrap_or("0").trim().parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            warn!(raw = ?raw, "unparseable integer, storing 0");
            0
        }
    }
}

/// Validates raw samples and appends them to the owning flight's position
/// log.
#[derive(Clone)]
pub struct TelemetryIngest {
    positions: Arc<dyn PositionLog>,
}

impl TelemetryIngest {
    pub fn new(positions: Arc<dyn PositionLog>) -> Self {
        Self { positions }
    }

    /// Normalize one raw sample and append it to `flight`'s position log.
    /// The stored phase stays unset only when the sample itself carried no
    /// phase field.
    pub async fn record(&self, flight: &Flight, sample: RawSample<'_>) -> Result<Position> {
        let position = NewPosition {
            flight_id: flight.id,
            latitude: parse_coordinate(sample.latitude),
            longitude: parse_coordinate(sample.longitude),
            altitude: parse_integer(sample.altitude),
            heading: parse_integer(sample.heading),
            ground_speed: parse_integer(sample.ground_speed),
            phase: sample.phase.map(|raw| parse_integer(Some(raw))),
        };

        self.positions.append(position).await
    }
}
