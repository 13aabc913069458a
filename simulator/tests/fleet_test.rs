use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vitals_simulator::{
    DeviceContext, DeviceEvent, DeviceStatus, FailureKind, Fleet, FleetConfig, Limits,
    MemorySink, Result, TelemetryRecord, Transport,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(u32, String, TelemetryRecord)>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(u32, String, TelemetryRecord)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, device_id: u32, url: &str, record: &TelemetryRecord) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((device_id, url.to_string(), record.clone()));
        Ok(())
    }
}

fn fleet(devices: usize) -> (Fleet, Arc<RecordingTransport>, Arc<MemorySink>) {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(MemorySink::new());
    let config = FleetConfig {
        seed: Some(2024),
        max_stagger: Duration::ZERO,
        ..FleetConfig::new(devices, "collector.local", 8080, Duration::from_secs(1))
    };
    let context = DeviceContext::new(
        Arc::new(Limits::default()),
        transport.clone(),
        sink.clone(),
    );
    (Fleet::new(config, context).unwrap(), transport, sink)
}

#[tokio::test(start_paused = true)]
async fn test_five_devices_three_ticks() {
    let (fleet, transport, _) = fleet(5);

    fleet.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    fleet.shutdown().await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 15);

    let mut per_device: HashMap<u32, Vec<f64>> = HashMap::new();
    for (device_id, url, record) in &sent {
        assert_eq!(*device_id, record.id);
        assert_eq!(url, "http://collector.local:8080/api/device/send");
        per_device.entry(*device_id).or_default().push(record.timestamp);
    }

    assert_eq!(per_device.len(), 5);
    for (device_id, timestamps) in per_device {
        assert!(device_id < 5);
        assert_eq!(timestamps.len(), 3);
        assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_twice() {
    let (fleet, _, sink) = fleet(3);
    fleet.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    fleet.shutdown().await;
    fleet.shutdown().await;
    assert_eq!(fleet.stop(), 0);

    for device in fleet.devices() {
        assert_eq!(device.status(), DeviceStatus::Stopped);
        assert!(!device.is_running());
    }
    assert_eq!(sink.count(|e| matches!(e, DeviceEvent::Stopped { .. })), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_staggered_startup() {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(MemorySink::new());
    let config = FleetConfig {
        seed: Some(1),
        max_stagger: Duration::from_secs(10),
        ..FleetConfig::new(50, "localhost", 8080, Duration::from_secs(1))
    };
    let context = DeviceContext::new(Arc::new(Limits::default()), transport.clone(), sink);
    let fleet = Arc::new(Fleet::new(config, context).unwrap());

    let starter = {
        let fleet = Arc::clone(&fleet);
        tokio::spawn(async move { fleet.start().await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    fleet.stop();

    starter.await.unwrap().unwrap();
    fleet.join().await;

    assert!(fleet.devices().iter().all(|d| !d.is_running()));
    assert!(fleet.devices().iter().all(|d| !d.is_ready()));
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_device_does_not_affect_others() {
    struct FlakyTransport {
        inner: RecordingTransport,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, device_id: u32, url: &str, record: &TelemetryRecord) -> Result<()> {
            if device_id == 0 {
                return Err(vitals_simulator::Error::Transport("rejected".to_string()));
            }
            self.inner.send(device_id, url, record).await
        }
    }

    let transport = Arc::new(FlakyTransport {
        inner: RecordingTransport::default(),
    });
    let sink = Arc::new(MemorySink::new());
    let config = FleetConfig {
        seed: Some(5),
        max_stagger: Duration::ZERO,
        ..FleetConfig::new(3, "localhost", 8080, Duration::from_secs(1))
    };
    let context = DeviceContext::new(Arc::new(Limits::default()), transport.clone(), sink.clone());
    let fleet = Fleet::new(config, context).unwrap();

    fleet.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    fleet.shutdown().await;

    assert_eq!(transport.inner.sent().len(), 4);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            DeviceEvent::Failed {
                id: 0,
                kind: FailureKind::Transport,
                ..
            }
        )),
        2
    );
}
