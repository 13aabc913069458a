use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use vitals_simulator::TelemetryRecord;

use crate::model::DeviceSummary;

struct Entry {
    latest: TelemetryRecord,
    received: u64,
}

/// Latest snapshot and receive count per device, kept in memory.
#[derive(Default)]
pub struct Store {
    devices: RwLock<HashMap<u32, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot and returns how many this device has sent so far.
    ///
    /// A snapshot older than the stored one is counted but does not replace it.
    pub fn insert(&self, record: TelemetryRecord) -> u64 {
        let mut devices = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match devices.get_mut(&record.id) {
            Some(entry) => {
                entry.received += 1;
                if record.timestamp >= entry.latest.timestamp {
                    entry.latest = record;
                }
                entry.received
            }
            None => {
                devices.insert(
                    record.id,
                    Entry {
                        latest: record,
                        received: 1,
                    },
                );
                1
            }
        }
    }

    pub fn latest(&self, id: u32) -> Option<TelemetryRecord> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| entry.latest.clone())
    }

    /// Summaries ordered by device id.
    pub fn summaries(&self) -> Vec<DeviceSummary> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<DeviceSummary> = devices
            .iter()
            .map(|(id, entry)| DeviceSummary {
                id: *id,
                received: entry.received,
                last_timestamp: entry.latest.timestamp,
            })
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        summaries
    }

    pub fn device_count(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use vitals_simulator::Limits;

    fn record(id: u32, timestamp: f64) -> TelemetryRecord {
        let mut rng = StdRng::seed_from_u64(id as u64);
        let mut record =
            TelemetryRecord::generate(id, &Limits::default(), Duration::from_secs(1), &mut rng)
                .unwrap();
        record.timestamp = timestamp;
        record
    }

    #[test]
    fn test_insert_counts_per_device() {
        let store = Store::new();

        assert_eq!(store.insert(record(2, 10.0)), 1);
        assert_eq!(store.insert(record(2, 11.0)), 2);
        assert_eq!(store.insert(record(1, 10.0)), 1);

        assert_eq!(store.device_count(), 2);
        let ids: Vec<u32> = store.summaries().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_stale_record_does_not_replace_latest() {
        let store = Store::new();
        store.insert(record(5, 20.0));
        store.insert(record(5, 15.0));

        assert_eq!(store.latest(5).unwrap().timestamp, 20.0);
        assert_eq!(store.summaries()[0].received, 2);
        assert!(store.latest(6).is_none());
    }
}
