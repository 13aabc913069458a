use crate::errors::{Error, Result};
use crate::metrics::{
    DEVICES_SEEN, INVALID_RECORDS_TOTAL, RECORDS_TOTAL, RECORD_AGE_SECONDS, VALID_RECORDS_TOTAL,
};
use crate::model::{Accepted, DevicesResponse};
use crate::store::Store;
use crate::validate::validate;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use vitals_simulator::TelemetryRecord;

#[derive(Clone)]
struct AppState {
    store: Arc<Store>,
}

#[derive(Debug, Deserialize)]
pub struct DevicesQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

pub fn create_router(store: Arc<Store>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/device/send", post(receive_record))
        .route("/api/v1/devices", get(list_devices))
        .route("/api/v1/devices/:id", get(get_device))
        .with_state(state)
}

async fn receive_record(State(state): State<AppState>, body: Bytes) -> Result<Json<Accepted>> {
    RECORDS_TOTAL.inc();

    match ingest(&state.store, &body) {
        Ok(accepted) => {
            VALID_RECORDS_TOTAL.inc();
            Ok(Json(accepted))
        }
        Err(e) => {
            INVALID_RECORDS_TOTAL.inc();
            Err(e)
        }
    }
}

/// Parses, validates and stores a single record
fn ingest(store: &Store, payload: &[u8]) -> Result<Accepted> {
    let record: TelemetryRecord = serde_json::from_slice(payload)?;
    validate(&record)?;

    let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
    let age = now - record.timestamp;
    if age >= 0.0 {
        RECORD_AGE_SECONDS.observe(age);
    }

    let id = record.id;
    let received = store.insert(record);
    DEVICES_SEEN.set(store.device_count() as f64);
    debug!(device_id = id, received, "record stored");

    Ok(Accepted { id, received })
}

async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<DevicesQuery>,
) -> Json<DevicesResponse> {
    let limit = params.limit.unwrap_or(100).min(1000);
    let offset = params.offset.unwrap_or(0);

    let summaries = state.store.summaries();
    let total = summaries.len();
    let data = summaries.into_iter().skip(offset).take(limit).collect();

    Json(DevicesResponse {
        data,
        total,
        limit,
        offset,
    })
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<TelemetryRecord>> {
    state.store.latest(id).map(Json).ok_or(Error::NotFound(id))
}
