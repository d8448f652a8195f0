use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::aircraft_repo::AircraftRepository;
use crate::airports_repo::AirportsRepository;
use crate::config::Config;
use crate::flights_repo::FlightsRepository;
use crate::positions_repo::PositionsRepository;
use crate::protocol::{Dispatcher, ProtocolRequest};
use crate::sessions_repo::SessionsRepository;
use crate::telemetry::TelemetryIngest;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

// App state shared by the protocol handler
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// Decode an x-www-form-urlencoded body into a flat map. Query parameters
/// never leak into the form map: credentials are only accepted from the
/// body.
fn parse_form_body(body: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str(body).unwrap_or_default()
}

async fn smartcars_api(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let request = ProtocolRequest {
        query,
        form: parse_form_body(&body),
    };

    match state.dispatcher.dispatch(&request).await {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(e) => {
            error!(error = %e, "protocol dispatch failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        status.as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

/// Wire the diesel-backed repositories into a dispatcher.
pub fn build_dispatcher(pool: PgPool, config: Config) -> Dispatcher {
    let positions = Arc::new(PositionsRepository::new(pool.clone()));
    Dispatcher::new(
        config,
        Arc::new(SessionsRepository::new(pool.clone())),
        Arc::new(FlightsRepository::new(pool.clone())),
        Arc::new(AirportsRepository::new(pool.clone())),
        Arc::new(AircraftRepository::new(pool)),
        TelemetryIngest::new(positions),
    )
}

pub async fn start_web_server(interface: String, port: u16, pool: PgPool, config: Config) -> Result<()> {
    info!("Starting web server on {}:{}", interface, port);

    let app_state = AppState {
        dispatcher: build_dispatcher(pool, config),
    };

    // The flight-sim client hits the endpoint with and without the
    // trailing slash depending on its version.
    let app = Router::new()
        .route("/smartcars/", get(smartcars_api).post(smartcars_api))
        .route("/smartcars", get(smartcars_api).post(smartcars_api))
        .with_state(app_state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app).await?;

    Ok(())
}
