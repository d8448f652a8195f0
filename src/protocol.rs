//! smartCARS protocol dispatcher.
//!
//! One HTTP request carries an `action` discriminator plus flat query and
//! form maps; the reply is a single line of delimited text. Each action is
//! terminal: the first matching branch runs and replies. Domain failures
//! (bad credentials, stale sessions, unknown flights, empty lists) are
//! rendered locally as wire sentinels and never surface as errors; only
//! infrastructure failures propagate to the HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::aircraft::AircraftCatalog;
use crate::airports::AirportCatalog;
use crate::config::Config;
use crate::flights::{Flight, FlightStore, PilotReport};
use crate::response::join_fields;
use crate::sessions::SessionStore;
use crate::telemetry::{RawSample, TelemetryIngest, parse_integer};

/// Reply for any authentication failure: bad credentials, a missing or
/// stale session, or a request for a database this instance does not serve.
pub const AUTH_FAILED: &str = "AUTH_FAILED";
/// Reply when a referenced flight does not exist.
pub const ERROR: &str = "ERROR";
/// Reply for an empty flight list.
pub const NONE: &str = "NONE";
/// Reply for an empty airport catalog. Airports use `NO_DATA` where flight
/// lists use `NONE`; clients rely on the asymmetry.
pub const NO_DATA: &str = "NO_DATA";
/// Reply for a successful state-changing action.
pub const SUCCESS: &str = "SUCCESS";

/// The airline database id this deployment answers for.
const DBID: &str = "1";

/// Pilot id reported for the single configured pilot.
const PILOT_ID: &str = "0001";

/// Timestamp markers like `[12:34:56]` that clients embed mid-line in logs.
static LOG_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.)(\[[0-9]{2}:[0-9]{2}:[0-9]{2}\])").unwrap());

/// Actions understood by the dispatcher, parsed from the `action` query
/// parameter. Closed set: anything else gets the handshake banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManualLogin,
    AutomaticLogin,
    VerifySession,
    GetPilotCenterData,
    GetAirports,
    GetAircraft,
    GetBidFlights,
    PositionReport,
    FilePirep,
    BidOnFlight,
    DeleteBidFlight,
    SearchPireps,
    GetPirepData,
    SearchFlights,
    CreateFlight,
}

impl Action {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "manuallogin" => Self::ManualLogin,
            "automaticlogin" => Self::AutomaticLogin,
            "verifysession" => Self::VerifySession,
            "getpilotcenterdata" => Self::GetPilotCenterData,
            "getairports" => Self::GetAirports,
            "getaircraft" => Self::GetAircraft,
            "getbidflights" => Self::GetBidFlights,
            "positionreport" => Self::PositionReport,
            "filepirep" => Self::FilePirep,
            "bidonflight" => Self::BidOnFlight,
            "deletebidflight" => Self::DeleteBidFlight,
            "searchpireps" => Self::SearchPireps,
            "getpirepdata" => Self::GetPirepData,
            "searchflights" => Self::SearchFlights,
            "createflight" => Self::CreateFlight,
            _ => return None,
        })
    }
}

/// One inbound protocol request: flat string maps for the query string and
/// the urlencoded form body.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRequest {
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
}

impl ProtocolRequest {
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn form(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(String::as_str)
    }
}

/// Outcome of the shared preconditions for state-changing reports.
enum ReportAuth {
    Authorized(Flight),
    Denied,
    UnknownFlight,
}

/// The action router. Holds the store seams and the deployment identity,
/// and turns one request into one reply body.
#[derive(Clone)]
pub struct Dispatcher {
    config: Config,
    sessions: Arc<dyn SessionStore>,
    flights: Arc<dyn FlightStore>,
    airports: Arc<dyn AirportCatalog>,
    aircraft: Arc<dyn AircraftCatalog>,
    ingest: TelemetryIngest,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        flights: Arc<dyn FlightStore>,
        airports: Arc<dyn AirportCatalog>,
        aircraft: Arc<dyn AircraftCatalog>,
        ingest: TelemetryIngest,
    ) -> Self {
        Self {
            config,
            sessions,
            flights,
            airports,
            aircraft,
            ingest,
        }
    }

    /// Route one request to its handler. Only infrastructure failures
    /// surface as `Err`; every protocol-level failure is already rendered
    /// into the reply body.
    pub async fn dispatch(&self, request: &ProtocolRequest) -> Result<String> {
        debug!(query = ?request.query, form = ?request.form, "inbound protocol request");

        let Some(action) = request.query("action").and_then(Action::parse) else {
            return Ok(handshake_banner());
        };

        match action {
            Action::ManualLogin => self.manual_login(request).await,
            Action::AutomaticLogin => self.automatic_login(request).await,
            Action::VerifySession => self.verify_session(request).await,
            Action::GetPilotCenterData => self.pilot_center_data(request).await,
            Action::GetAirports => self.airport_list().await,
            Action::GetAircraft => self.aircraft_list().await,
            Action::GetBidFlights => self.bid_flight_list().await,
            Action::PositionReport => self.position_report(request).await,
            Action::FilePirep => self.file_pirep(request).await,
            // Bid management and report search are not supported by this
            // deployment; the fixed replies keep the client moving.
            Action::BidOnFlight | Action::DeleteBidFlight | Action::CreateFlight => {
                Ok(AUTH_FAILED.to_string())
            }
            Action::SearchPireps | Action::SearchFlights => Ok(NONE.to_string()),
            Action::GetPirepData => Ok(String::new()),
        }
    }

    /// Nine comma-joined fields describing the configured pilot, echoing
    /// the session token the client presented.
    fn user_record(&self, token: &str) -> String {
        join_fields(
            ',',
            &[
                DBID,
                self.config.airline_icao.as_str(),
                PILOT_ID,
                token,
                self.config.first_name.as_str(),
                self.config.last_name.as_str(),
                "",
                self.config.rank_level.as_str(),
                self.config.rank_string.as_str(),
            ],
        )
    }

    async fn manual_login(&self, request: &ProtocolRequest) -> Result<String> {
        let userid_ok = request.query("userid") == Some(self.config.userid.as_str());
        let password_ok = request.form("password") == Some(self.config.password.as_str());
        if !(userid_ok && password_ok) {
            warn!("manual login rejected");
            return Ok(AUTH_FAILED.to_string());
        }

        let token = request.query("sessionid").unwrap_or_default();
        self.sessions.create(token).await?;
        info!(token, "manual login");
        Ok(self.user_record(token))
    }

    async fn automatic_login(&self, request: &ProtocolRequest) -> Result<String> {
        if request.query("dbid") != Some(DBID) {
            return Ok(AUTH_FAILED.to_string());
        }
        let Some(old_token) = request.query("oldsessionid") else {
            return Ok(AUTH_FAILED.to_string());
        };

        let new_token = request.query("sessionid").unwrap_or_default();
        match self.sessions.renew(old_token, new_token).await? {
            Some(_) => {
                info!(old_token, new_token, "session renewed");
                Ok(self.user_record(new_token))
            }
            None => Ok(AUTH_FAILED.to_string()),
        }
    }

    async fn verify_session(&self, request: &ProtocolRequest) -> Result<String> {
        if !self.config.enable_chat {
            return Ok(AUTH_FAILED.to_string());
        }
        if request.query("dbid") != Some(DBID) {
            return Ok(AUTH_FAILED.to_string());
        }

        let token = request.query("sessionid").unwrap_or_default();
        let Some(session) = self.sessions.find_by_token(token).await? else {
            return Ok(AUTH_FAILED.to_string());
        };

        Ok(join_fields(
            ',',
            &[
                session.token.as_str(),
                self.config.first_name.as_str(),
                self.config.last_name.as_str(),
            ],
        ))
    }

    /// Career statistics over completed flights: total block time rendered
    /// as HH:MM:00, the completed-flight count (twice, as the client
    /// expects) and the floored mean landing rate. With nothing completed
    /// yet the client gets all-zero stats rather than a division by zero.
    async fn pilot_center_data(&self, request: &ProtocolRequest) -> Result<String> {
        if request.query("dbid") != Some(DBID) {
            return Ok(AUTH_FAILED.to_string());
        }

        let completed = self.flights.list_completed(false).await?;
        let count = completed.len() as i64;
        let total_minutes: i64 = completed
            .iter()
            .map(|flight| i64::from(flight.duration.unwrap_or(0)))
            .sum();
        let rate_sum: i64 = completed
            .iter()
            .map(|flight| i64::from(flight.landing_rate.unwrap_or(0)))
            .sum();
        let average_rate = if count == 0 { 0 } else { rate_sum.div_euclid(count) };

        Ok(join_fields(
            ',',
            &[
                format_block_time(total_minutes),
                count.to_string(),
                average_rate.to_string(),
                count.to_string(),
            ],
        ))
    }

    async fn airport_list(&self) -> Result<String> {
        let airports = self.airports.list().await?;
        if airports.is_empty() {
            return Ok(NO_DATA.to_string());
        }

        let records: Vec<String> = airports
            .iter()
            .map(|airport| {
                join_fields(
                    '|',
                    &[
                        airport.id.to_string(),
                        airport.icao.to_uppercase(),
                        airport.name.clone(),
                        airport.latitude.to_string(),
                        airport.longitude.to_string(),
                        airport.country.clone(),
                    ],
                )
            })
            .collect();
        Ok(join_fields(';', &records))
    }

    async fn aircraft_list(&self) -> Result<String> {
        let fleet = self.aircraft.list().await?;

        // An empty fleet joins to an empty body, not an error sentinel.
        let records: Vec<String> = fleet
            .iter()
            .map(|aircraft| {
                join_fields(
                    ',',
                    &[
                        aircraft.id.to_string(),
                        aircraft.name.clone(),
                        aircraft.icao.clone(),
                        aircraft.registration.clone(),
                        aircraft.max_passengers.to_string(),
                        aircraft.max_cargo.to_string(),
                        self.config.rank_level.clone(),
                    ],
                )
            })
            .collect();
        Ok(join_fields(';', &records))
    }

    async fn bid_flight_list(&self) -> Result<String> {
        let open = self.flights.list_open().await?;
        if open.is_empty() {
            return Ok(NONE.to_string());
        }

        let mut records = Vec::with_capacity(open.len());
        for flight in &open {
            let origin = self
                .airports
                .get(flight.origin_id)
                .await?
                .with_context(|| format!("flight {} references unknown origin", flight.id))?;
            let destination = self
                .airports
                .get(flight.destination_id)
                .await?
                .with_context(|| format!("flight {} references unknown destination", flight.id))?;

            records.push(join_fields(
                '|',
                &[
                    flight.id.to_string(),
                    flight.id.to_string(),
                    flight.airline_icao.clone(),
                    flight.flight_number.to_string(),
                    origin.icao,
                    destination.icao,
                    flight.route.clone(),
                    // Clients expect the cruise altitude in feet.
                    (flight.flight_level * 100).to_string(),
                    flight.aircraft_id.to_string(),
                    "N/A".to_string(),
                    "N/A".to_string(),
                    "N/A".to_string(),
                    "randomopen".to_string(),
                    String::new(),
                    String::new(),
                ],
            ));
        }
        Ok(join_fields(';', &records))
    }

    /// Shared preconditions for state-changing reports: the configured
    /// dbid, a live session and a bid id resolving to a real flight.
    async fn authorize_report(&self, request: &ProtocolRequest) -> Result<ReportAuth> {
        if request.query("dbid") != Some(DBID) {
            return Ok(ReportAuth::Denied);
        }

        let token = request.query("sessionid").unwrap_or_default();
        if self.sessions.find_by_token(token).await?.is_none() {
            return Ok(ReportAuth::Denied);
        }

        // A bid id that is absent or not a number cannot name a flight.
        let Some(flight_id) = request.query("bidid").and_then(|raw| raw.parse::<i32>().ok())
        else {
            return Ok(ReportAuth::UnknownFlight);
        };

        match self.flights.get(flight_id).await? {
            Some(flight) => Ok(ReportAuth::Authorized(flight)),
            None => Ok(ReportAuth::UnknownFlight),
        }
    }

    async fn position_report(&self, request: &ProtocolRequest) -> Result<String> {
        let flight = match self.authorize_report(request).await? {
            ReportAuth::Authorized(flight) => flight,
            ReportAuth::Denied => return Ok(AUTH_FAILED.to_string()),
            ReportAuth::UnknownFlight => return Ok(ERROR.to_string()),
        };

        self.flights
            .update_route(&flight, request.form("route"))
            .await?;

        let sample = RawSample {
            latitude: request.query("latitude"),
            longitude: request.query("longitude"),
            altitude: request.query("altitude"),
            heading: request.query("magneticheading"),
            ground_speed: request.query("groundspeed"),
            phase: Some(request.query("phase").unwrap_or("0")),
        };
        self.ingest.record(&flight, sample).await?;

        Ok(SUCCESS.to_string())
    }

    async fn file_pirep(&self, request: &ProtocolRequest) -> Result<String> {
        let flight = match self.authorize_report(request).await? {
            ReportAuth::Authorized(flight) => flight,
            ReportAuth::Denied => return Ok(AUTH_FAILED.to_string()),
            ReportAuth::UnknownFlight => return Ok(ERROR.to_string()),
        };

        self.flights
            .update_route(&flight, request.form("route"))
            .await?;

        let report = PilotReport {
            log: break_log_lines(request.form("log").unwrap_or_default()),
            comments: request.form("comments").map(str::to_string),
            landing_rate: parse_integer(request.query("landingrate")),
            duration: parse_duration_minutes(request.query("flighttime").unwrap_or("00.00")),
        };
        self.flights.file_report(flight.id, &report).await?;
        info!(
            flight_id = flight.id,
            duration = report.duration,
            landing_rate = report.landing_rate,
            "pilot report filed"
        );

        Ok(SUCCESS.to_string())
    }
}

/// Identification banner returned for unknown or missing actions; the
/// client uses it as a reachability probe.
fn handshake_banner() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Script OK, Frame Version: myACARS/{version}, Interface Version: myACARS/{version}")
}

/// Render total block minutes as the HH:MM:00 wall-clock form used by the
/// pilot-center stats.
fn format_block_time(total_minutes: i64) -> String {
    format!("{:02}:{:02}:00", total_minutes / 60, total_minutes % 60)
}

/// Clients embed `[HH:MM:SS]` markers mid-line; give every marker that is
/// not already at the start of the text its own line.
pub fn break_log_lines(raw: &str) -> String {
    LOG_MARKER_RE.replace_all(raw, "${1}\n${2}").into_owned()
}

/// Flight time arrives as a clock value with `.` separating hours and
/// minutes ("1.30" is ninety minutes). Unparseable values count as zero.
pub fn parse_duration_minutes(raw: &str) -> i32 {
    match NaiveTime::parse_from_str(raw, "%H.%M") {
        Ok(time) => (time.minute() + 60 * time.hour()) as i32,
        Err(_) => {
            warn!(raw, "unparseable flight time, storing 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::aircraft::Aircraft;
    use crate::airports::Airport;
    use crate::positions::{NewPosition, Position, PositionLog};
    use crate::sessions::Session;

    #[derive(Default)]
    struct MemorySessions {
        rows: Mutex<Vec<Session>>,
        next_id: AtomicI32,
    }

    #[async_trait]
    impl SessionStore for MemorySessions {
        async fn create(&self, token: &str) -> Result<Session> {
            let session = Session {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                token: token.to_string(),
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(session.clone());
            Ok(session)
        }

        async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|session| session.token == token)
                .cloned())
        }

        async fn renew(&self, old_token: &str, new_token: &str) -> Result<Option<Session>> {
            let mut rows = self.rows.lock().unwrap();
            let Some(index) = rows.iter().position(|session| session.token == old_token) else {
                return Ok(None);
            };
            rows.remove(index);
            let session = Session {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                token: new_token.to_string(),
                created_at: Utc::now(),
            };
            rows.push(session.clone());
            Ok(Some(session))
        }
    }

    #[derive(Default)]
    struct MemoryFlights {
        rows: Mutex<Vec<Flight>>,
    }

    #[async_trait]
    impl FlightStore for MemoryFlights {
        async fn list_open(&self) -> Result<Vec<Flight>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|flight| flight.is_open())
                .cloned()
                .collect())
        }

        async fn get(&self, id: i32) -> Result<Option<Flight>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|flight| flight.id == id)
                .cloned())
        }

        async fn list_completed(&self, newest_first: bool) -> Result<Vec<Flight>> {
            let mut completed: Vec<Flight> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|flight| flight.is_completed())
                .cloned()
                .collect();
            if newest_first {
                completed.sort_by(|a, b| b.id.cmp(&a.id));
            }
            Ok(completed)
        }

        async fn update_route(&self, flight: &Flight, submitted: Option<&str>) -> Result<()> {
            if let Some(new_route) = crate::flights::route_change(&flight.route, submitted) {
                let mut rows = self.rows.lock().unwrap();
                if let Some(row) = rows.iter_mut().find(|row| row.id == flight.id) {
                    row.route = new_route.to_string();
                }
            }
            Ok(())
        }

        async fn file_report(&self, flight_id: i32, report: &PilotReport) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|row| row.id == flight_id) {
                row.log = Some(report.log.clone());
                row.comments = report.comments.clone();
                row.landing_rate = Some(report.landing_rate);
                row.duration = Some(report.duration);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryPositions {
        rows: Mutex<Vec<Position>>,
    }

    #[async_trait]
    impl PositionLog for MemoryPositions {
        async fn append(&self, sample: NewPosition) -> Result<Position> {
            let mut rows = self.rows.lock().unwrap();
            let position = Position {
                id: rows.len() as i32 + 1,
                flight_id: sample.flight_id,
                latitude: sample.latitude,
                longitude: sample.longitude,
                altitude: sample.altitude,
                heading: sample.heading,
                ground_speed: sample.ground_speed,
                phase: sample.phase,
                timestamp: Utc::now(),
            };
            rows.push(position.clone());
            Ok(position)
        }
    }

    struct MemoryAirports {
        rows: Vec<Airport>,
    }

    #[async_trait]
    impl AirportCatalog for MemoryAirports {
        async fn list(&self) -> Result<Vec<Airport>> {
            Ok(self.rows.clone())
        }

        async fn get(&self, id: i32) -> Result<Option<Airport>> {
            Ok(self.rows.iter().find(|airport| airport.id == id).cloned())
        }
    }

    struct MemoryAircraft {
        rows: Vec<Aircraft>,
    }

    #[async_trait]
    impl AircraftCatalog for MemoryAircraft {
        async fn list(&self) -> Result<Vec<Aircraft>> {
            Ok(self.rows.clone())
        }

        async fn get(&self, id: i32) -> Result<Option<Aircraft>> {
            Ok(self.rows.iter().find(|aircraft| aircraft.id == id).cloned())
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        sessions: Arc<MemorySessions>,
        flights: Arc<MemoryFlights>,
        positions: Arc<MemoryPositions>,
    }

    fn harness(
        config: Config,
        airports: Vec<Airport>,
        aircraft: Vec<Aircraft>,
        flights: Vec<Flight>,
    ) -> Harness {
        let sessions = Arc::new(MemorySessions::default());
        let flight_store = Arc::new(MemoryFlights {
            rows: Mutex::new(flights),
        });
        let positions = Arc::new(MemoryPositions::default());
        let dispatcher = Dispatcher::new(
            config,
            sessions.clone(),
            flight_store.clone(),
            Arc::new(MemoryAirports { rows: airports }),
            Arc::new(MemoryAircraft { rows: aircraft }),
            TelemetryIngest::new(positions.clone()),
        );
        Harness {
            dispatcher,
            sessions,
            flights: flight_store,
            positions,
        }
    }

    fn request(query: &[(&str, &str)], form: &[(&str, &str)]) -> ProtocolRequest {
        ProtocolRequest {
            query: query
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            form: form
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn airport(id: i32, icao: &str) -> Airport {
        Airport {
            id,
            icao: icao.to_string(),
            name: format!("{icao} Intl"),
            latitude: 50.05,
            longitude: 8.57,
            country: "DE".to_string(),
        }
    }

    fn open_flight(id: i32) -> Flight {
        Flight {
            id,
            airline_icao: "AAA".to_string(),
            flight_number: 100 + id,
            origin_id: 1,
            destination_id: 2,
            route: "DCT".to_string(),
            flight_level: 350,
            aircraft_id: 1,
            duration: None,
            landing_rate: None,
            log: None,
            comments: None,
        }
    }

    fn completed_flight(id: i32, duration: i32, landing_rate: i32) -> Flight {
        Flight {
            duration: Some(duration),
            landing_rate: Some(landing_rate),
            log: Some("[12:00:00] departed".to_string()),
            ..open_flight(id)
        }
    }

    fn default_airports() -> Vec<Airport> {
        vec![airport(1, "EDDF"), airport(2, "KJFK")]
    }

    #[tokio::test]
    async fn test_unknown_action_returns_handshake_banner() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        for query in [vec![], vec![("action", "somethingelse")]] {
            let reply = h.dispatcher.dispatch(&request(&query, &[])).await.unwrap();
            assert!(reply.starts_with("Script OK, Frame Version: myACARS/"));
            assert!(reply.contains("Interface Version: myACARS/"));
        }
    }

    #[tokio::test]
    async fn test_manual_login_returns_user_record_and_stores_token() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "manuallogin"),
                    ("userid", "userid"),
                    ("sessionid", "tok1"),
                ],
                &[("password", "password")],
            ))
            .await
            .unwrap();

        assert_eq!(reply, "1,AAA,0001,tok1,Airline,Pilot,,captain,Captain");
        assert!(h.sessions.find_by_token("tok1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_manual_login_rejects_password_in_query_string() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        // The password only counts when it arrives in the form body.
        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "manuallogin"),
                    ("userid", "userid"),
                    ("password", "password"),
                    ("sessionid", "tok1"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
        assert!(h.sessions.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_login_rejects_bad_credentials() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[("action", "manuallogin"), ("userid", "intruder")],
                &[("password", "password")],
            ))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
    }

    #[tokio::test]
    async fn test_login_round_trip_leaves_exactly_one_token() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        h.dispatcher
            .dispatch(&request(
                &[
                    ("action", "manuallogin"),
                    ("userid", "userid"),
                    ("sessionid", "tok1"),
                ],
                &[("password", "password")],
            ))
            .await
            .unwrap();

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "automaticlogin"),
                    ("dbid", "1"),
                    ("oldsessionid", "tok1"),
                    ("sessionid", "tok2"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, "1,AAA,0001,tok2,Airline,Pilot,,captain,Captain");
        assert_eq!(h.sessions.rows.lock().unwrap().len(), 1);
        assert!(h.sessions.find_by_token("tok1").await.unwrap().is_none());
        assert!(h.sessions.find_by_token("tok2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_automatic_login_requires_known_old_session() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "automaticlogin"),
                    ("dbid", "1"),
                    ("oldsessionid", "ghost"),
                    ("sessionid", "tok2"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
        assert!(h.sessions.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_automatic_login_rejects_wrong_dbid() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "automaticlogin"),
                    ("dbid", "2"),
                    ("oldsessionid", "tok1"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
    }

    #[tokio::test]
    async fn test_verify_session_gated_on_chat_feature() {
        let h = harness(Config::default(), vec![], vec![], vec![]);
        h.sessions.create("tok1").await.unwrap();

        let req = request(
            &[
                ("action", "verifysession"),
                ("dbid", "1"),
                ("sessionid", "tok1"),
            ],
            &[],
        );
        assert_eq!(h.dispatcher.dispatch(&req).await.unwrap(), AUTH_FAILED);

        let chat_config = Config {
            enable_chat: true,
            ..Config::default()
        };
        let h = harness(chat_config, vec![], vec![], vec![]);
        h.sessions.create("tok1").await.unwrap();

        assert_eq!(
            h.dispatcher.dispatch(&req).await.unwrap(),
            "tok1,Airline,Pilot"
        );
    }

    #[tokio::test]
    async fn test_pilot_center_data_aggregates_completed_flights() {
        let flights = vec![
            completed_flight(1, 90, -250),
            completed_flight(2, 45, -101),
            open_flight(3),
        ];
        let h = harness(Config::default(), default_airports(), vec![], flights);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getpilotcenterdata"), ("dbid", "1")], &[]))
            .await
            .unwrap();

        // 135 minutes, two flights, floor((-250 + -101) / 2) = -176.
        assert_eq!(reply, "02:15:00,2,-176,2");
    }

    #[tokio::test]
    async fn test_pilot_center_data_with_no_completed_flights_is_all_zero() {
        let h = harness(Config::default(), vec![], vec![], vec![open_flight(1)]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getpilotcenterdata"), ("dbid", "1")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, "00:00:00,0,0,0");
    }

    #[tokio::test]
    async fn test_pilot_center_data_requires_dbid() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getpilotcenterdata")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
    }

    #[tokio::test]
    async fn test_get_airports_lists_catalog_with_uppercased_icao() {
        let airports = vec![airport(1, "eddf"), airport(2, "KJFK")];
        let h = harness(Config::default(), airports, vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getairports")], &[]))
            .await
            .unwrap();

        assert_eq!(
            reply,
            "1|EDDF|eddf Intl|50.05|8.57|DE;2|KJFK|KJFK Intl|50.05|8.57|DE"
        );
    }

    #[tokio::test]
    async fn test_get_airports_strips_record_delimiters_from_names() {
        let mut airports = vec![airport(1, "EDDF")];
        airports[0].name = "Frank|furt;Main".to_string();
        let h = harness(Config::default(), airports, vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getairports")], &[]))
            .await
            .unwrap();

        // `|` is stripped by the field join; `;` survives field joining but
        // is stripped when the records themselves are joined.
        assert_eq!(reply, "1|EDDF|FrankfurtMain|50.05|8.57|DE");
    }

    #[tokio::test]
    async fn test_get_airports_empty_catalog_returns_no_data() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getairports")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, NO_DATA);
    }

    #[tokio::test]
    async fn test_get_aircraft_appends_rank_level() {
        let fleet = vec![Aircraft {
            id: 1,
            icao: "A320".to_string(),
            name: "Airbus A320".to_string(),
            registration: "D-AAAA".to_string(),
            max_passengers: 180,
            max_cargo: 20000,
        }];
        let h = harness(Config::default(), vec![], fleet, vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getaircraft")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, "1,Airbus A320,A320,D-AAAA,180,20000,captain");
    }

    #[tokio::test]
    async fn test_get_aircraft_empty_fleet_is_empty_body_not_sentinel() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getaircraft")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn test_get_bid_flights_lists_open_flights_only() {
        let flights = vec![open_flight(1), completed_flight(2, 90, -180)];
        let h = harness(Config::default(), default_airports(), vec![], flights);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getbidflights")], &[]))
            .await
            .unwrap();

        assert_eq!(
            reply,
            "1|1|AAA|101|EDDF|KJFK|DCT|35000|1|N/A|N/A|N/A|randomopen||"
        );
    }

    #[tokio::test]
    async fn test_get_bid_flights_empty_returns_none() {
        let h = harness(Config::default(), default_airports(), vec![], vec![]);

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getbidflights")], &[]))
            .await
            .unwrap();

        assert_eq!(reply, NONE);
    }

    #[tokio::test]
    async fn test_completed_flight_never_reappears_in_bid_list() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );
        h.sessions.create("tok1").await.unwrap();

        h.dispatcher
            .dispatch(&request(
                &[
                    ("action", "filepirep"),
                    ("dbid", "1"),
                    ("sessionid", "tok1"),
                    ("bidid", "1"),
                    ("landingrate", "-180"),
                    ("flighttime", "1.30"),
                ],
                &[("log", "[12:00:00] departed")],
            ))
            .await
            .unwrap();

        let reply = h
            .dispatcher
            .dispatch(&request(&[("action", "getbidflights")], &[]))
            .await
            .unwrap();
        assert_eq!(reply, NONE);
    }

    #[tokio::test]
    async fn test_position_report_appends_normalized_sample() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );
        h.sessions.create("tok1").await.unwrap();

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "positionreport"),
                    ("dbid", "1"),
                    ("sessionid", "tok1"),
                    ("bidid", "1"),
                    ("latitude", "50,123"),
                    ("longitude", "0.0001"),
                    ("altitude", "35000"),
                    ("magneticheading", "270"),
                    ("groundspeed", "450"),
                ],
                &[("route", "DCT WAYPT DCT")],
            ))
            .await
            .unwrap();

        assert_eq!(reply, SUCCESS);

        let rows = h.positions.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].latitude, 50.123);
        assert_eq!(rows[0].longitude, 0.0);
        assert_eq!(rows[0].altitude, 35000);
        assert_eq!(rows[0].heading, 270);
        assert_eq!(rows[0].ground_speed, 450);
        // The wire defaults an unsent phase to zero rather than leaving it
        // unset.
        assert_eq!(rows[0].phase, Some(0));
        drop(rows);

        let flight = h.flights.get(1).await.unwrap().unwrap();
        assert_eq!(flight.route, "DCT WAYPT DCT");
    }

    #[tokio::test]
    async fn test_position_report_without_session_is_rejected() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "positionreport"),
                    ("dbid", "1"),
                    ("sessionid", "ghost"),
                    ("bidid", "1"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, AUTH_FAILED);
        assert!(h.positions.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_position_report_unknown_flight_returns_error_without_rows() {
        let h = harness(Config::default(), default_airports(), vec![], vec![]);
        h.sessions.create("tok1").await.unwrap();

        for bidid in ["999", "not-a-number"] {
            let reply = h
                .dispatcher
                .dispatch(&request(
                    &[
                        ("action", "positionreport"),
                        ("dbid", "1"),
                        ("sessionid", "tok1"),
                        ("bidid", bidid),
                    ],
                    &[],
                ))
                .await
                .unwrap();
            assert_eq!(reply, ERROR);
        }
        assert!(h.positions.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_position_report_preserves_route_on_empty_submission() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );
        h.sessions.create("tok1").await.unwrap();

        h.dispatcher
            .dispatch(&request(
                &[
                    ("action", "positionreport"),
                    ("dbid", "1"),
                    ("sessionid", "tok1"),
                    ("bidid", "1"),
                ],
                &[],
            ))
            .await
            .unwrap();

        let flight = h.flights.get(1).await.unwrap().unwrap();
        assert_eq!(flight.route, "DCT");
    }

    #[tokio::test]
    async fn test_file_pirep_completes_the_flight() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );
        h.sessions.create("tok1").await.unwrap();

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "filepirep"),
                    ("dbid", "1"),
                    ("sessionid", "tok1"),
                    ("bidid", "1"),
                    ("landingrate", "-180"),
                    ("flighttime", "1.30"),
                ],
                &[
                    ("log", "hello[12:00:00]world[13:00:00]"),
                    ("comments", "smooth flight"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(reply, SUCCESS);

        let flight = h.flights.get(1).await.unwrap().unwrap();
        assert_eq!(
            flight.log.as_deref(),
            Some("hello\n[12:00:00]world\n[13:00:00]")
        );
        assert_eq!(flight.comments.as_deref(), Some("smooth flight"));
        assert_eq!(flight.landing_rate, Some(-180));
        assert_eq!(flight.duration, Some(90));
        assert!(flight.is_completed());
    }

    #[tokio::test]
    async fn test_file_pirep_defaults_missing_fields_to_zero() {
        let h = harness(
            Config::default(),
            default_airports(),
            vec![],
            vec![open_flight(1)],
        );
        h.sessions.create("tok1").await.unwrap();

        let reply = h
            .dispatcher
            .dispatch(&request(
                &[
                    ("action", "filepirep"),
                    ("dbid", "1"),
                    ("sessionid", "tok1"),
                    ("bidid", "1"),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(reply, SUCCESS);

        let flight = h.flights.get(1).await.unwrap().unwrap();
        assert_eq!(flight.log.as_deref(), Some(""));
        assert_eq!(flight.comments, None);
        assert_eq!(flight.landing_rate, Some(0));
        assert_eq!(flight.duration, Some(0));
    }

    #[tokio::test]
    async fn test_unsupported_actions_reply_with_fixed_sentinels() {
        let h = harness(Config::default(), vec![], vec![], vec![]);

        for (action, expected) in [
            ("bidonflight", AUTH_FAILED),
            ("deletebidflight", AUTH_FAILED),
            ("createflight", AUTH_FAILED),
            ("searchpireps", NONE),
            ("searchflights", NONE),
            ("getpirepdata", ""),
        ] {
            let reply = h
                .dispatcher
                .dispatch(&request(&[("action", action)], &[]))
                .await
                .unwrap();
            assert_eq!(reply, expected, "action {action}");
        }
    }

    #[test]
    fn test_break_log_lines_inserts_newline_before_non_leading_markers() {
        assert_eq!(
            break_log_lines("hello[12:00:00]world[13:00:00]"),
            "hello\n[12:00:00]world\n[13:00:00]"
        );
        // A marker already at the start of the text stays put.
        assert_eq!(
            break_log_lines("[12:00:00] departed"),
            "[12:00:00] departed"
        );
        assert_eq!(break_log_lines(""), "");
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration_minutes("1.30"), 90);
        assert_eq!(parse_duration_minutes("0.05"), 5);
        assert_eq!(parse_duration_minutes("00.00"), 0);
        assert_eq!(parse_duration_minutes("12.45"), 765);
        assert_eq!(parse_duration_minutes("bogus"), 0);
    }

    #[test]
    fn test_format_block_time() {
        assert_eq!(format_block_time(0), "00:00:00");
        assert_eq!(format_block_time(135), "02:15:00");
        assert_eq!(format_block_time(605), "10:05:00");
    }
}
