//! myACARS - a smartCARS-compatible flight tracking gateway
//!
//! One HTTP endpoint speaks the delimited-text smartCARS protocol to the
//! flight-simulator client. Everything the protocol touches (sessions,
//! flights, telemetry, reference data) is persisted through the repository
//! layer, so external tooling can read and write the same entities.

pub mod aircraft;
pub mod aircraft_repo;
pub mod airports;
pub mod airports_repo;
pub mod config;
pub mod flights;
pub mod flights_repo;
pub mod positions;
pub mod positions_repo;
pub mod protocol;
pub mod response;
pub mod schema;
pub mod sessions;
pub mod sessions_repo;
pub mod telemetry;
pub mod web;

pub use config::Config;
pub use protocol::{Dispatcher, ProtocolRequest};
