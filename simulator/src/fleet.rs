//! Fleet orchestration: creates devices, staggers their startup and
//! coordinates shutdown.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{Device, DeviceContext, DeviceStatus};
use crate::errors::{Error, Result};
use crate::transport::endpoint_url;

/// Orchestrator-facing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    pub device_count: usize,
    pub address: String,
    pub port: u16,
    /// Time between two ticks of every device.
    pub interval: Duration,
    /// Fleet-level seed; device streams derive from it. Random when unset.
    pub seed: Option<u64>,
    /// Upper bound of the random delay between two device startups.
    pub max_stagger: Duration,
    /// Per-tick GPS movement, in meters, along each axis.
    pub wander_meters: Option<f64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            device_count: 10,
            address: "localhost".to_string(),
            port: 8080,
            interval: Duration::from_secs(1),
            seed: None,
            max_stagger: Duration::from_secs(1),
            wander_meters: None,
        }
    }
}

impl FleetConfig {
    pub fn new(device_count: usize, address: impl Into<String>, port: u16, interval: Duration) -> Self {
        Self {
            device_count,
            address: address.into(),
            port,
            interval,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.device_count > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "device count {} exceeds the id space",
                self.device_count
            )));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig(
                "reporting interval must be positive".to_string(),
            ));
        }
        if self.address.trim().is_empty() {
            return Err(Error::InvalidConfig("target address is empty".to_string()));
        }
        Ok(())
    }
}

/// Seed of device `id`'s random stream; distinct for distinct ids.
pub fn device_seed(fleet_seed: u64, id: u32) -> u64 {
    // odd multiplier keeps the mapping a bijection
    fleet_seed
        .wrapping_add(id as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub struct Fleet {
    config: FleetConfig,
    endpoint: String,
    devices: Vec<Device>,
    rng: Mutex<StdRng>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl Fleet {
    /// Builds `device_count` devices with ids `0..device_count`.
    ///
    /// Fails on invalid configuration or limits before any device exists.
    pub fn new(config: FleetConfig, context: DeviceContext) -> Result<Self> {
        config.validate()?;
        context.limits.validate()?;

        let fleet_seed = config.seed.unwrap_or_else(rand::random);
        debug!(fleet_seed, devices = config.device_count, "creating fleet");

        let devices = (0..config.device_count as u32)
            .map(|id| {
                let device = Device::new(
                    id,
                    config.interval,
                    device_seed(fleet_seed, id),
                    context.clone(),
                )?;
                match config.wander_meters {
                    Some(meters) => device.with_wander(meters),
                    None => Ok(device),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            endpoint: endpoint_url(&config.address, config.port),
            rng: Mutex::new(StdRng::seed_from_u64(fleet_seed)),
            config,
            devices,
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Binds, starts and readies every device.
    ///
    /// Devices are started one after another with a random delay in
    /// `[0, max_stagger)` between consecutive starts; telemetry flows only
    /// once all of them are running. Returns early if `stop` is called
    /// during startup. Calling it again is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("fleet already started");
            return Ok(());
        }

        info!(
            "Starting {} devices reporting to {} every {:?}",
            self.devices.len(),
            self.endpoint,
            self.config.interval
        );

        for device in &self.devices {
            if self.interrupted(device.bind(self.endpoint.as_str()))? {
                return Ok(());
            }
        }

        for (i, device) in self.devices.iter().enumerate() {
            if i > 0 {
                let delay = self.stagger();
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("Fleet stopped during startup after {} devices", i);
                        return Ok(());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.interrupted(device.start())? {
                info!("Fleet stopped during startup after {} devices", i);
                return Ok(());
            }
        }

        for device in &self.devices {
            if self.interrupted(device.ready())? {
                return Ok(());
            }
        }

        info!("All {} devices ready", self.devices.len());
        Ok(())
    }

    /// True when a transition failed because the fleet is shutting down.
    fn interrupted(&self, transition: Result<DeviceStatus>) -> Result<bool> {
        match transition {
            Ok(_) => Ok(self.shutdown.is_cancelled()),
            Err(_) if self.shutdown.is_cancelled() => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn stagger(&self) -> Duration {
        if self.config.max_stagger.is_zero() {
            return Duration::ZERO;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let fraction: f64 = rng.gen_range(0.0..1.0);
        self.config.max_stagger.mul_f64(fraction)
    }

    /// Stops every device still running. Idempotent; returns how many
    /// devices were signalled by this call.
    pub fn stop(&self) -> usize {
        self.shutdown.cancel();

        let mut stopped = 0;
        for device in self.devices.iter().filter(|device| device.is_running()) {
            device.stop();
            stopped += 1;
        }

        if stopped > 0 {
            info!("Stopping {} devices", stopped);
        }
        stopped
    }

    /// Waits until every device loop has exited.
    pub async fn join(&self) {
        for device in &self.devices {
            device.join().await;
        }
    }

    /// Stops the fleet and waits for confirmation from every device.
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
        info!("Fleet shut down");
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::limits::{Limit, Limits};
    use crate::transport::DryRunTransport;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn context(limits: Limits) -> DeviceContext {
        DeviceContext::new(
            Arc::new(limits),
            Arc::new(DryRunTransport),
            Arc::new(MemorySink::new()),
        )
    }

    fn config(devices: usize) -> FleetConfig {
        FleetConfig {
            seed: Some(1),
            max_stagger: Duration::ZERO,
            ..FleetConfig::new(devices, "127.0.0.1", 9000, Duration::from_secs(1))
        }
    }

    #[test]
    fn test_device_ids_are_sequential() {
        let fleet = Fleet::new(config(4), context(Limits::default())).unwrap();

        let ids: Vec<u32> = fleet.devices().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(fleet.endpoint(), "http://127.0.0.1:9000/api/device/send");
    }

    #[test]
    fn test_device_seeds_are_distinct() {
        let seeds: HashSet<u64> = (0..10_000).map(|id| device_seed(99, id)).collect();
        assert_eq!(seeds.len(), 10_000);
    }

    #[test]
    fn test_devices_get_independent_streams() {
        let fleet = Fleet::new(config(2), context(Limits::default())).unwrap();
        let a = fleet.devices()[0].snapshot();
        let b = fleet.devices()[1].snapshot();

        assert_ne!(a.gps, b.gps);
    }

    #[test]
    fn test_same_seed_same_fleet() {
        let first = Fleet::new(config(3), context(Limits::default())).unwrap();
        let second = Fleet::new(config(3), context(Limits::default())).unwrap();

        for (a, b) in first.devices().iter().zip(second.devices()) {
            let (a, b) = (a.snapshot(), b.snapshot());
            assert_eq!(a.gps, b.gps);
            assert_eq!(a.birth, b.birth);
            assert_eq!(a.blood_pressure, b.blood_pressure);
        }
    }

    #[test]
    fn test_invalid_limit_fails_construction() {
        let mut limits = Limits::default();
        limits.saturation = Limit::new(100.0, 0.0, 2);

        assert!(matches!(
            Fleet::new(config(3), context(limits)),
            Err(Error::InvalidLimit { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config(1);
        bad.interval = Duration::ZERO;
        assert!(Fleet::new(bad, context(Limits::default())).is_err());

        let mut bad = config(1);
        bad.address = " ".to_string();
        assert!(Fleet::new(bad, context(Limits::default())).is_err());

        let mut bad = config(1);
        bad.wander_meters = Some(f64::NAN);
        assert!(Fleet::new(bad, context(Limits::default())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let fleet = Fleet::new(config(3), context(Limits::default())).unwrap();
        fleet.start().await.unwrap();

        assert_eq!(fleet.stop(), 3);
        fleet.join().await;
        assert_eq!(fleet.stop(), 0);
        assert!(fleet.devices().iter().all(|d| !d.is_running()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let fleet = Fleet::new(config(2), context(Limits::default())).unwrap();
        fleet.start().await.unwrap();
        fleet.start().await.unwrap();

        assert!(fleet.devices().iter().all(|d| d.is_ready()));
        fleet.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_stop_is_noop() {
        let fleet = Fleet::new(config(3), context(Limits::default())).unwrap();
        assert_eq!(fleet.stop(), 3);

        fleet.start().await.unwrap();
        assert!(fleet
            .devices()
            .iter()
            .all(|d| d.status() == DeviceStatus::Stopped && !d.is_ready()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stop_during_start() {
        for _ in 0..100 {
            let fleet = Arc::new(Fleet::new(config(200), context(Limits::default())).unwrap());

            let stopper = {
                let fleet = Arc::clone(&fleet);
                tokio::spawn(async move { fleet.stop() })
            };
            let result = fleet.start().await;
            stopper.await.unwrap();
            fleet.join().await;

            assert!(result.is_ok(), "{:?}", result);
            assert!(fleet.devices().iter().all(|d| !d.is_running()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stagger_bounded() {
        let mut cfg = config(4);
        cfg.max_stagger = Duration::from_secs(1);
        let fleet = Fleet::new(cfg, context(Limits::default())).unwrap();

        let begin = tokio::time::Instant::now();
        fleet.start().await.unwrap();
        let elapsed = begin.elapsed();

        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
        assert!(fleet.devices().iter().all(|d| d.is_ready()));
        fleet.shutdown().await;
    }
}
