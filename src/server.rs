//! `GET /{pid}`: CSV content of a data object, or the upstream failure
//! status and message unchanged.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::ObjectId;
use crate::error::PortalError;
use crate::retrieval::{CsvFetcher, FetchFailure};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn CsvFetcher>,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn CsvFetcher>) -> Self {
        Self { fetcher }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{pid}", get(get_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), PortalError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| PortalError::Server(format!("bind {addr}: {err}")))?;
    info!(%addr, "CSV retrieval endpoint listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|err| PortalError::Server(err.to_string()))
}

async fn get_csv(State(state): State<AppState>, Path(pid): Path<String>) -> Response {
    let pid: ObjectId = match pid.parse() {
        Ok(pid) => pid,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let fetcher = Arc::clone(&state.fetcher);
    let outcome = tokio::task::spawn_blocking(move || fetcher.fetch_csv(&pid)).await;
    match outcome {
        Ok(Ok(bytes)) => ([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], bytes).into_response(),
        Ok(Err(failure)) => failure_response(failure),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

fn failure_response(failure: FetchFailure) -> Response {
    let status =
        StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, failure.message).into_response()
}
