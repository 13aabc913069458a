use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::fleet::FleetConfig;
use crate::limits::Limits;

/// Simulated fleet of health-monitoring devices reporting to a collector.
#[derive(Debug, Clone, Parser)]
#[command(name = "vitals-simulator", version, about)]
pub struct Args {
    /// Number of devices to simulate
    #[arg(short = 'n', long = "devices", env = "DEVICES", default_value_t = 10)]
    pub devices: usize,

    /// Collector host name or address
    #[arg(long, env = "TARGET_ADDRESS", default_value = "localhost")]
    pub address: String,

    /// Collector port
    #[arg(long, env = "TARGET_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between two reports of a device
    #[arg(long, env = "INTERVAL_SECS", default_value_t = 1.0)]
    pub interval: f64,

    /// Fleet seed for reproducible telemetry
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Maximum random delay in seconds between two device startups
    #[arg(long, env = "STAGGER_SECS", default_value_t = 1.0)]
    pub stagger: f64,

    /// Move every device by up to this many meters per report
    #[arg(long, env = "WANDER_METERS")]
    pub wander: Option<f64>,

    /// JSON file overriding the default metric limits
    #[arg(long, env = "LIMITS_FILE")]
    pub limits: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "SEND_TIMEOUT_SECS", default_value_t = 5.0)]
    pub timeout: f64,

    /// Log records instead of sending them
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        Error::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        ))
    })
}

impl Args {
    pub fn fleet_config(&self) -> Result<FleetConfig> {
        Ok(FleetConfig {
            device_count: self.devices,
            address: self.address.clone(),
            port: self.port,
            interval: seconds("interval", self.interval)?,
            seed: self.seed,
            max_stagger: seconds("stagger", self.stagger)?,
            wander_meters: self.wander,
        })
    }

    pub fn send_timeout(&self) -> Result<Duration> {
        seconds("timeout", self.timeout)
    }

    pub fn load_limits(&self) -> Result<Limits> {
        match &self.limits {
            Some(path) => Limits::from_json_file(path),
            None => Ok(Limits::default()),
        }
    }
}
