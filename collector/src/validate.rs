use vitals_simulator::generator::days_in_month;
use vitals_simulator::TelemetryRecord;

use crate::errors::{Error, Result};

const LATITUDE_MIN: f64 = -90.0;
const LATITUDE_MAX: f64 = 90.0;
const LONGITUDE_MIN: f64 = -180.0;
const LONGITUDE_MAX: f64 = 180.0;
const SATURATION_MIN: f64 = 0.0;
const SATURATION_MAX: f64 = 100.0;

fn in_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(Error::Validation(format!(
            "{} {} out of range [{}, {}]",
            name, value, min, max
        )));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_nan() || value < 0.0 {
        return Err(Error::Validation(format!(
            "{} {} must be non-negative",
            name, value
        )));
    }
    Ok(())
}

/// Validates a device record before it is stored.
///
/// Physiological readings drawn from normal distributions may legitimately
/// fall outside healthy ranges, so only physically impossible values are
/// rejected.
pub fn validate(record: &TelemetryRecord) -> Result<()> {
    if !record.timestamp.is_finite() || record.timestamp <= 0.0 {
        return Err(Error::Validation(format!(
            "Timestamp {} must be a positive number of seconds",
            record.timestamp
        )));
    }

    let readings = [
        ("Systolic pressure", record.blood_pressure.systolic),
        ("Diastolic pressure", record.blood_pressure.diastolic),
        ("Pulse", record.pulse),
        ("Electrodermal response", record.electrodermal_response),
        ("Body temperature", record.body_temperature),
    ];
    for (name, value) in readings {
        if !value.is_finite() {
            return Err(Error::Validation(format!("{} is not a number", name)));
        }
    }

    in_range("Saturation", record.saturation, SATURATION_MIN, SATURATION_MAX)?;
    non_negative("Blood glucose content", record.blood_glucose_content)?;
    non_negative("Blood alcohol content", record.blood_alcohol_content)?;
    non_negative("LDL cholesterol", record.cholesterol.ldl)?;
    non_negative("HDL cholesterol", record.cholesterol.hdl)?;

    in_range("Latitude", record.gps.latitude, LATITUDE_MIN, LATITUDE_MAX)?;
    in_range("Longitude", record.gps.longitude, LONGITUDE_MIN, LONGITUDE_MAX)?;

    let birth = record.birth;
    if !(1..=12).contains(&birth.month) {
        return Err(Error::Validation(format!(
            "Birth month {} out of range [1, 12]",
            birth.month
        )));
    }
    if birth.day == 0 || birth.day > days_in_month(birth.month) {
        return Err(Error::Validation(format!(
            "Birth day {} invalid for month {}",
            birth.day, birth.month
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use vitals_simulator::Limits;

    fn record() -> TelemetryRecord {
        let mut rng = StdRng::seed_from_u64(8);
        TelemetryRecord::generate(1, &Limits::default(), Duration::from_secs(1), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_valid_record() {
        assert!(validate(&record()).is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        let mut record = record();
        record.gps.latitude = 91.0; // Out of range

        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_invalid_saturation() {
        let mut record = record();
        record.saturation = 120.0; // Out of range

        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_negative_alcohol() {
        let mut record = record();
        record.blood_alcohol_content = -0.1;

        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_invalid_birth_day() {
        let mut record = record();
        record.birth.month = 2;
        record.birth.day = 29; // No leap days

        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut record = record();
        record.timestamp = 0.0;

        assert!(validate(&record).is_err());
    }

    #[test]
    fn test_out_of_healthy_range_pulse_accepted() {
        let mut record = record();
        record.pulse = 130.0;

        assert!(validate(&record).is_ok());
    }
}
