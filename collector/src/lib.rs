//! Demo ingestion endpoint for the vitals simulator.
//!
//! Accepts device records at `POST /api/device/send`, validates them and
//! keeps the latest snapshot per device in memory.
//!
//! # Endpoints
//! - `POST /api/device/send`: ingest one record
//! - `GET /api/v1/devices`: per-device receive counts (`limit`, `offset`)
//! - `GET /api/v1/devices/{id}`: latest record of a device
//! - `GET /metrics`: Prometheus metrics

pub mod errors;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod store;
pub mod validate;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::store::Store;

/// Full HTTP application: REST API plus the metrics endpoint.
pub fn app(store: Arc<Store>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(store))
}

async fn metrics_handler() -> errors::Result<String> {
    metrics::gather_metrics()
}
