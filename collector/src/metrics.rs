use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

use crate::errors::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RECORDS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_records_total",
        "Total records received from devices"
    ))
    .unwrap();
    pub static ref VALID_RECORDS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_valid_records_total",
        "Total records accepted after validation"
    ))
    .unwrap();
    pub static ref INVALID_RECORDS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "collector_invalid_records_total",
        "Total records rejected as malformed or out of range"
    ))
    .unwrap();
    pub static ref DEVICES_SEEN: Gauge = Gauge::with_opts(Opts::new(
        "collector_devices_seen",
        "Number of distinct device ids that reported at least once"
    ))
    .unwrap();
    pub static ref RECORD_AGE_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "collector_record_age_seconds",
            "Delay between a record's timestamp and its arrival"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECORDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALID_RECORDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_RECORDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICES_SEEN.clone()))?;
    REGISTRY.register(Box::new(RECORD_AGE_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
