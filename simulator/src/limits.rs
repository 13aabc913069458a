use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::errors::{Error, Result};

/// Physiological and positional signals a device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Systolic,
    Diastolic,
    Pulse,
    Saturation,
    ElectrodermalResponse,
    BodyTemperature,
    BloodGlucoseContent,
    BloodAlcoholContent,
    CholesterolLdl,
    CholesterolHdl,
    Latitude,
    Longitude,
    Age,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Systolic => "systolic",
            Metric::Diastolic => "diastolic",
            Metric::Pulse => "pulse",
            Metric::Saturation => "saturation",
            Metric::ElectrodermalResponse => "electrodermal_response",
            Metric::BodyTemperature => "body_temperature",
            Metric::BloodGlucoseContent => "blood_glucose_content",
            Metric::BloodAlcoholContent => "blood_alcohol_content",
            Metric::CholesterolLdl => "ldl",
            Metric::CholesterolHdl => "hdl",
            Metric::Latitude => "latitude",
            Metric::Longitude => "longitude",
            Metric::Age => "age",
        }
    }

    pub fn all() -> &'static [Metric] {
        &[
            Metric::Systolic,
            Metric::Diastolic,
            Metric::Pulse,
            Metric::Saturation,
            Metric::ElectrodermalResponse,
            Metric::BodyTemperature,
            Metric::BloodGlucoseContent,
            Metric::BloodAlcoholContent,
            Metric::CholesterolLdl,
            Metric::CholesterolHdl,
            Metric::Latitude,
            Metric::Longitude,
            Metric::Age,
        ]
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest precision an f64 reading can carry.
pub const MAX_DECIMALS: u32 = 15;

/// Bounds, optional average and output precision of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub avg: Option<f64>,
    pub decimals: u32,
}

impl Limit {
    pub const fn new(min: f64, max: f64, decimals: u32) -> Self {
        Self {
            min,
            max,
            avg: None,
            decimals,
        }
    }

    pub fn with_avg(mut self, avg: f64) -> Self {
        self.avg = Some(avg);
        self
    }

    /// Configured average, or the midpoint of the bounds when none is set.
    pub fn mean(&self) -> f64 {
        self.avg.unwrap_or((self.min + self.max) / 2.0)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn validate(&self, metric: Metric) -> Result<()> {
        let finite = self.min.is_finite()
            && self.max.is_finite()
            && self.avg.map_or(true, f64::is_finite);
        if !finite {
            return Err(Error::NonFiniteLimit(metric));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(Error::InvalidPrecision {
                metric,
                decimals: self.decimals,
                max: MAX_DECIMALS,
            });
        }
        if self.min > self.max {
            return Err(Error::InvalidLimit {
                metric,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Per-metric limits shared read-only by every device of a fleet.
///
/// Deserialising from JSON keeps the default for every metric the
/// document omits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub systolic: Limit,
    pub diastolic: Limit,
    pub pulse: Limit,
    pub saturation: Limit,
    pub electrodermal_response: Limit,
    pub body_temperature: Limit,
    pub blood_glucose_content: Limit,
    pub blood_alcohol_content: Limit,
    pub ldl: Limit,
    pub hdl: Limit,
    pub latitude: Limit,
    pub longitude: Limit,
    pub age: Limit,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            systolic: Limit::new(90.0, 180.0, 1).with_avg(130.0),
            diastolic: Limit::new(60.0, 110.0, 1).with_avg(77.0),
            pulse: Limit::new(60.0, 100.0, 1),
            saturation: Limit::new(0.0, 100.0, 2),
            electrodermal_response: Limit::new(0.3, 0.37, 4),
            body_temperature: Limit::new(36.5, 37.5, 2),
            blood_glucose_content: Limit::new(50.0, 380.0, 1),
            blood_alcohol_content: Limit::new(0.0, 0.5, 3),
            ldl: Limit::new(90.0, 200.0, 2),
            hdl: Limit::new(30.0, 70.0, 2),
            latitude: Limit::new(-90.0, 90.0, 8),
            longitude: Limit::new(-180.0, 180.0, 8),
            age: Limit::new(18.0, 100.0, 0),
        }
    }
}

impl Limits {
    pub fn get(&self, metric: Metric) -> &Limit {
        match metric {
            Metric::Systolic => &self.systolic,
            Metric::Diastolic => &self.diastolic,
            Metric::Pulse => &self.pulse,
            Metric::Saturation => &self.saturation,
            Metric::ElectrodermalResponse => &self.electrodermal_response,
            Metric::BodyTemperature => &self.body_temperature,
            Metric::BloodGlucoseContent => &self.blood_glucose_content,
            Metric::BloodAlcoholContent => &self.blood_alcohol_content,
            Metric::CholesterolLdl => &self.ldl,
            Metric::CholesterolHdl => &self.hdl,
            Metric::Latitude => &self.latitude,
            Metric::Longitude => &self.longitude,
            Metric::Age => &self.age,
        }
    }

    /// Rejects any limit with `min > max`, non-finite values or more than
    /// [`MAX_DECIMALS`] decimals.
    pub fn validate(&self) -> Result<()> {
        Metric::all()
            .iter()
            .try_for_each(|metric| self.get(*metric).validate(*metric))
    }

    /// Loads limits from a JSON file and validates them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let limits: Limits = serde_json::from_str(&raw)?;
        limits.validate()?;
        Ok(limits)
    }
}
