use chrono::{Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Result;
use crate::generator;
use crate::limits::{Limits, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: f64,
    pub diastolic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cholesterol {
    pub ldl: f64,
    pub hdl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birth {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Snapshot a device reports on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: u32,
    /// Seconds since the Unix epoch, microsecond resolution.
    pub timestamp: f64,
    pub blood_pressure: BloodPressure,
    pub pulse: f64,
    pub saturation: f64,
    pub electrodermal_response: f64,
    pub body_temperature: f64,
    pub blood_glucose_content: f64,
    pub blood_alcohol_content: f64,
    pub cholesterol: Cholesterol,
    pub steps: u64,
    pub gps: Gps,
    pub birth: Birth,
}

impl TelemetryRecord {
    /// Builds the initial snapshot of device `id`.
    pub fn generate<R: Rng + ?Sized>(
        id: u32,
        limits: &Limits,
        interval: Duration,
        rng: &mut R,
    ) -> Result<Self> {
        let now = Utc::now();
        let (year, month, day) = generator::birth(&limits.age, now.year(), rng)?;
        let (latitude, longitude) = generator::position(limits, rng)?;
        let steps = generator::steps(interval, rng);
        let mut draw = |metric: Metric| generator::sample(metric, limits.get(metric), &mut *rng);

        Ok(Self {
            id,
            timestamp: epoch_seconds(now),
            blood_pressure: BloodPressure {
                systolic: draw(Metric::Systolic)?,
                diastolic: draw(Metric::Diastolic)?,
            },
            pulse: draw(Metric::Pulse)?,
            saturation: draw(Metric::Saturation)?,
            electrodermal_response: draw(Metric::ElectrodermalResponse)?,
            body_temperature: draw(Metric::BodyTemperature)?,
            blood_glucose_content: draw(Metric::BloodGlucoseContent)?,
            blood_alcohol_content: draw(Metric::BloodAlcoholContent)?,
            cholesterol: Cholesterol {
                ldl: draw(Metric::CholesterolLdl)?,
                hdl: draw(Metric::CholesterolHdl)?,
            },
            steps,
            gps: Gps {
                latitude,
                longitude,
            },
            birth: Birth { year, month, day },
        })
    }

    /// Regenerates the per-tick fields: timestamp and steps.
    ///
    /// The new timestamp is always strictly greater than the previous one,
    /// even if the wall clock did not advance between ticks.
    pub fn refresh<R: Rng + ?Sized>(&mut self, interval: Duration, rng: &mut R) {
        let now = epoch_seconds(Utc::now());
        self.timestamp = if now > self.timestamp {
            now
        } else {
            self.timestamp + 1e-6
        };
        self.steps = generator::steps(interval, rng);
    }

    /// Moves the reported position by the given offsets in meters.
    pub fn displace(&mut self, north_m: f64, east_m: f64, limits: &Limits) {
        let (latitude, longitude) = generator::displace(
            self.gps.latitude,
            self.gps.longitude,
            north_m,
            east_m,
            limits,
        );
        self.gps = Gps {
            latitude,
            longitude,
        };
    }
}

fn epoch_seconds(at: chrono::DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record() -> TelemetryRecord {
        let mut rng = StdRng::seed_from_u64(1);
        TelemetryRecord::generate(7, &Limits::default(), Duration::from_secs(1), &mut rng).unwrap()
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(record()).unwrap();

        assert_eq!(value["id"], 7);
        assert!(value["timestamp"].is_f64());
        for path in [
            "/blood_pressure/systolic",
            "/blood_pressure/diastolic",
            "/pulse",
            "/saturation",
            "/electrodermal_response",
            "/body_temperature",
            "/blood_glucose_content",
            "/blood_alcohol_content",
            "/cholesterol/ldl",
            "/cholesterol/hdl",
            "/gps/latitude",
            "/gps/longitude",
        ] {
            assert!(value.pointer(path).is_some_and(|v| v.is_number()), "{}", path);
        }
        assert!(value["steps"].is_u64());
        assert!(value["birth"]["year"].is_i64());
        assert!(value["birth"]["month"].is_u64());
        assert!(value["birth"]["day"].is_u64());
        assert_eq!(value.as_object().unwrap().len(), 13);
    }

    #[test]
    fn test_refresh_keeps_fixed_fields() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut record = record();
        let before = record.clone();

        record.refresh(Duration::from_secs(1), &mut rng);

        assert!(record.timestamp > before.timestamp);
        assert_eq!(record.id, before.id);
        assert_eq!(record.gps, before.gps);
        assert_eq!(record.birth, before.birth);
        assert_eq!(record.blood_pressure, before.blood_pressure);
    }

    #[test]
    fn test_refresh_timestamps_strictly_increase() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut record = record();
        let mut last = record.timestamp;

        for _ in 0..1_000 {
            record.refresh(Duration::from_secs(1), &mut rng);
            assert!(record.timestamp > last);
            last = record.timestamp;
        }
    }

    #[test]
    fn test_displace_moves_gps_only() {
        let mut record = record();
        let before = record.clone();

        record.displace(0.0, 0.0, &Limits::default());
        assert!((record.gps.latitude - before.gps.latitude).abs() < 1e-8);

        record.displace(500.0, 500.0, &Limits::default());
        assert_ne!(record.gps, before.gps);
        assert_eq!(record.timestamp, before.timestamp);
    }
}
