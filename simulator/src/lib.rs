//! Fleet of simulated health-monitoring devices.
//!
//! Every [`Device`] runs its own reporting loop on a Tokio task: it waits
//! one interval (or until stopped), refreshes its telemetry snapshot and
//! hands it to a [`Transport`]. A [`Fleet`] creates the devices, staggers
//! their startup, flips them to ready in one pass and stops them on
//! shutdown.
//!
//! # Usage
//! ```bash
//! # 50 devices reporting every 2 seconds to a local collector
//! vitals-simulator --devices 50 --interval 2 --address localhost --port 8080
//!
//! # Log records instead of sending them
//! vitals-simulator --devices 5 --dry-run
//! ```

pub mod config;
pub mod device;
pub mod diagnostics;
pub mod errors;
pub mod fleet;
pub mod generator;
pub mod limits;
pub mod telemetry;
pub mod transport;

pub use config::Args;
pub use device::{Device, DeviceContext, DeviceStatus};
pub use diagnostics::{DeviceEvent, DiagnosticSink, FailureKind, MemorySink, TracingSink};
pub use errors::{Error, Result};
pub use fleet::{Fleet, FleetConfig};
pub use limits::{Limit, Limits, Metric};
pub use telemetry::{Birth, BloodPressure, Cholesterol, Gps, TelemetryRecord};
pub use transport::{endpoint_url, DryRunTransport, HttpTransport, Transport};
