//! Simulated device: lifecycle state machine plus its reporting loop.
//!
//! A [`Device`] is controlled from any thread through `&self` methods. The
//! reporting loop runs as its own Tokio task and owns the telemetry record
//! and random stream; the handle only shares a cancellation token, a
//! readiness flag and the bound endpoint with it. Every snapshot the loop
//! produces is published on a watch channel for observers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::diagnostics::{DeviceEvent, DiagnosticSink};
use crate::errors::{Error, Result};
use crate::limits::Limits;
use crate::telemetry::TelemetryRecord;
use crate::transport::Transport;

/// Lifecycle of a device. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Created,
    Bound,
    Started,
    Ready,
    Stopped,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Created => "created",
            DeviceStatus::Bound => "bound",
            DeviceStatus::Started => "started",
            DeviceStatus::Ready => "ready",
            DeviceStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators shared by every device of a fleet.
#[derive(Clone)]
pub struct DeviceContext {
    pub limits: Arc<Limits>,
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn DiagnosticSink>,
}

impl DeviceContext {
    pub fn new(
        limits: Arc<Limits>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            limits,
            transport,
            sink,
        }
    }
}

struct Shared {
    endpoint: RwLock<Option<String>>,
    ready: AtomicBool,
    running: AtomicBool,
    cancel: CancellationToken,
}

/// State moved into the reporting task on `start`.
struct Worker {
    id: u32,
    interval: Duration,
    wander_meters: Option<f64>,
    record: TelemetryRecord,
    rng: StdRng,
    snapshot: watch::Sender<TelemetryRecord>,
    shared: Arc<Shared>,
    context: DeviceContext,
}

pub struct Device {
    id: u32,
    status: Mutex<DeviceStatus>,
    shared: Arc<Shared>,
    snapshot: watch::Receiver<TelemetryRecord>,
    worker: Mutex<Option<Worker>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<dyn DiagnosticSink>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Device {
    /// Creates device `id` with its initial snapshot drawn from a random
    /// stream seeded with `seed`.
    pub fn new(id: u32, interval: Duration, seed: u64, context: DeviceContext) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "reporting interval must be positive".to_string(),
            ));
        }
        context.limits.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let record = TelemetryRecord::generate(id, &context.limits, interval, &mut rng)?;
        let (tx, rx) = watch::channel(record.clone());

        let shared = Arc::new(Shared {
            endpoint: RwLock::new(None),
            ready: AtomicBool::new(false),
            running: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        });

        let sink = Arc::clone(&context.sink);
        let worker = Worker {
            id,
            interval,
            wander_meters: None,
            record,
            rng,
            snapshot: tx,
            shared: Arc::clone(&shared),
            context,
        };

        Ok(Self {
            id,
            status: Mutex::new(DeviceStatus::Created),
            shared,
            snapshot: rx,
            worker: Mutex::new(Some(worker)),
            handle: Mutex::new(None),
            sink,
        })
    }

    /// Makes every ready tick move the device by up to `meters` north and
    /// east. Must be set before `start`.
    pub fn with_wander(mut self, meters: f64) -> Result<Self> {
        if !meters.is_finite() || meters < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "wander distance must be a non-negative number of meters, got {}",
                meters
            )));
        }
        if let Some(worker) = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
        {
            worker.wander_meters = Some(meters);
        }
        Ok(self)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> DeviceStatus {
        *lock(&self.status)
    }

    pub fn endpoint(&self) -> Option<String> {
        self.shared
            .endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest snapshot produced by the reporting loop.
    pub fn snapshot(&self) -> TelemetryRecord {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TelemetryRecord> {
        self.snapshot.clone()
    }

    /// Sets the collector URL. Allowed until the device is started.
    pub fn bind(&self, endpoint: impl Into<String>) -> Result<DeviceStatus> {
        let mut status = lock(&self.status);
        match *status {
            DeviceStatus::Created | DeviceStatus::Bound => {}
            from => return Err(Error::InvalidTransition { from, op: "bind" }),
        }

        let endpoint = endpoint.into();
        *self
            .shared
            .endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(endpoint.clone());
        *status = DeviceStatus::Bound;
        self.sink.report(DeviceEvent::Bound {
            id: self.id,
            endpoint,
        });
        Ok(*status)
    }

    /// Launches the reporting loop on the current Tokio runtime.
    ///
    /// A second call while the loop exists is a no-op.
    pub fn start(&self) -> Result<DeviceStatus> {
        let mut status = lock(&self.status);
        match *status {
            DeviceStatus::Created | DeviceStatus::Bound => {}
            DeviceStatus::Started | DeviceStatus::Ready => return Ok(*status),
            from @ DeviceStatus::Stopped => {
                return Err(Error::InvalidTransition { from, op: "start" })
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let worker = lock(&self.worker).take().ok_or(Error::InvalidTransition {
            from: *status,
            op: "start",
        })?;
        *lock(&self.handle) = Some(runtime.spawn(worker.run()));
        self.sink.report(DeviceEvent::Started { id: self.id });

        *status = if self.shared.ready.load(Ordering::Acquire) {
            DeviceStatus::Ready
        } else {
            DeviceStatus::Started
        };
        Ok(*status)
    }

    /// Lets ticks produce sends. May be called before `start`, in which
    /// case the device becomes `Ready` as soon as it starts.
    pub fn ready(&self) -> Result<DeviceStatus> {
        let mut status = lock(&self.status);
        if *status == DeviceStatus::Stopped {
            return Err(Error::InvalidTransition {
                from: *status,
                op: "ready",
            });
        }

        let first = !self.shared.ready.swap(true, Ordering::AcqRel);
        if *status == DeviceStatus::Started {
            *status = DeviceStatus::Ready;
        }
        if first {
            self.sink.report(DeviceEvent::Ready { id: self.id });
        }
        Ok(*status)
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Requests termination. Safe to call repeatedly and concurrently.
    ///
    /// A pending wait in the loop returns immediately; a send already in
    /// flight completes first.
    pub fn stop(&self) -> DeviceStatus {
        let mut status = lock(&self.status);
        if *status == DeviceStatus::Stopped {
            return DeviceStatus::Stopped;
        }
        *status = DeviceStatus::Stopped;
        self.shared.cancel.cancel();

        // never started: nothing will observe the token
        if lock(&self.worker).take().is_some() {
            self.shared.running.store(false, Ordering::Release);
            self.sink.report(DeviceEvent::Stopped { id: self.id });
        }
        DeviceStatus::Stopped
    }

    /// True until the loop has observed `stop`.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Waits for the reporting loop to exit.
    pub async fn join(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(device_id = self.id, "device task ended abnormally: {}", e);
            }
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("snapshot", &*self.snapshot.borrow())
            .finish()
    }
}

impl Worker {
    async fn run(mut self) {
        debug!(device_id = self.id, interval = ?self.interval, "device loop running");

        loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if !self.shared.ready.load(Ordering::Acquire) {
                continue;
            }

            let event = match self.tick().await {
                Ok(timestamp) => DeviceEvent::Delivered {
                    id: self.id,
                    timestamp,
                },
                Err(e) => DeviceEvent::Failed {
                    id: self.id,
                    kind: e.failure_kind(),
                    message: e.to_string(),
                },
            };
            self.context.sink.report(event);
        }

        self.shared.running.store(false, Ordering::Release);
        self.context.sink.report(DeviceEvent::Stopped { id: self.id });
    }

    async fn tick(&mut self) -> Result<f64> {
        self.record.refresh(self.interval, &mut self.rng);
        if let Some(meters) = self.wander_meters {
            let north = self.rng.gen_range(-meters..=meters);
            let east = self.rng.gen_range(-meters..=meters);
            self.record.displace(north, east, &self.context.limits);
        }
        self.snapshot.send_replace(self.record.clone());

        let endpoint = self
            .shared
            .endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Unbound(self.id))?;

        self.context
            .transport
            .send(self.id, &endpoint, &self.record)
            .await?;
        Ok(self.record.timestamp)
    }
}
