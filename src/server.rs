use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::geo::GeocodeClient;
use crate::types::{Assignment, Dataset, Office, Ticket};

#[derive(Clone)]
struct ApiState {
    config: Config,
    // Fairness rotation survives across requests for the process lifetime.
    dispatcher: Arc<Mutex<Dispatcher>>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct AssignResponse {
    assignments: Vec<Assignment>,
    failures: Vec<String>,
    /// The dataset with updated loads and appended assignments, for the
    /// caller to persist.
    dataset: Dataset,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GeocodeRequest {
    #[serde(default)]
    offices: Vec<Office>,
    #[serde(default)]
    tickets: Vec<Ticket>,
}

#[derive(Debug, Serialize)]
struct GeocodeResponse {
    geocoded_offices: usize,
    geocoded_tickets: usize,
    offices: Vec<Office>,
    tickets: Vec<Ticket>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let dispatcher = Dispatcher::new(&config.routing);
    let state = ApiState {
        config,
        dispatcher: Arc::new(Mutex::new(dispatcher)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/assign", post(assign))
        .route("/v1/geocode", post(geocode))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn assign(
    State(state): State<ApiState>,
    Json(mut dataset): Json<Dataset>,
) -> ApiResult<AssignResponse> {
    let mut dispatcher = state.dispatcher.lock().await;
    let report = dispatcher.assign(&mut dataset);
    Ok(ok(AssignResponse {
        assignments: report.assignments,
        failures: report.failures,
        dataset,
    }))
}

async fn geocode(
    State(state): State<ApiState>,
    Json(mut request): Json<GeocodeRequest>,
) -> ApiResult<GeocodeResponse> {
    let client = GeocodeClient::new(&state.config.geocoder).map_err(ApiError::internal)?;
    let home_country = state.config.routing.home_country.as_str();
    let geocoded_offices = client
        .geocode_offices(&mut request.offices, home_country)
        .await;
    let geocoded_tickets = client.geocode_tickets(&mut request.tickets).await;
    Ok(ok(GeocodeResponse {
        geocoded_offices,
        geocoded_tickets,
        offices: request.offices,
        tickets: request.tickets,
    }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
