//! Bounded random samples for every reported metric.
//!
//! Each metric maps to a distribution family through [`Metric::family`];
//! [`sample`] is the single entry point that turns a family and a [`Limit`]
//! into one rounded value. None of these functions hold state: every call
//! takes the caller's random source, so each device drives its own stream.

use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal, Open01};
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::limits::{Limit, Limits, Metric};

/// Earth radius in meters (WGS-84 equatorial).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Beta shape of the age distribution, skewed towards younger adults.
const AGE_SHAPE: (f64, f64) = (2.0, 4.0);

/// Shape of the distribution a metric is drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Family {
    /// `Normal(limit.mean(), stdev)`, rounded but not clamped.
    Normal { stdev: f64 },
    /// `Beta(alpha, beta)` mapped affinely onto `[min, max]`.
    Beta { alpha: f64, beta: f64 },
    /// Uniform over `[min, max]`.
    Uniform,
}

impl Metric {
    pub fn family(&self) -> Family {
        match self {
            Metric::Systolic => Family::Normal { stdev: 20.0 },
            Metric::Diastolic => Family::Normal { stdev: 13.0 },
            Metric::Pulse => Family::Normal { stdev: 12.0 },
            Metric::BodyTemperature => Family::Normal { stdev: 0.7 },
            Metric::ElectrodermalResponse => Family::Normal { stdev: 0.01 },
            // low values near the healthy minimum
            Metric::CholesterolLdl => Family::Beta { alpha: 0.3, beta: 3.0 },
            // high values near the healthy maximum
            Metric::CholesterolHdl => Family::Beta { alpha: 2.0, beta: 0.1 },
            Metric::Saturation => Family::Beta { alpha: 15.0, beta: 0.5 },
            Metric::BloodAlcoholContent => Family::Beta { alpha: 0.05, beta: 2.0 },
            Metric::BloodGlucoseContent => Family::Beta { alpha: 0.05, beta: 2.0 },
            Metric::Age => Family::Beta {
                alpha: AGE_SHAPE.0,
                beta: AGE_SHAPE.1,
            },
            Metric::Latitude | Metric::Longitude => Family::Uniform,
        }
    }
}

/// Rounds `value` half away from zero to `decimals` fractional digits.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Draws one value of `metric` within its configured limit.
pub fn sample<R: Rng + ?Sized>(metric: Metric, limit: &Limit, rng: &mut R) -> Result<f64> {
    match metric.family() {
        Family::Normal { stdev } => {
            let normal = Normal::new(limit.mean(), stdev).map_err(|e| Error::Distribution {
                metric,
                reason: e.to_string(),
            })?;
            Ok(round_to(normal.sample(rng), limit.decimals))
        }
        Family::Beta { alpha, beta } => {
            let unit = sample_beta(metric, alpha, beta, rng)?;
            let value = round_to(limit.min + limit.span() * unit, limit.decimals);
            Ok(value.clamp(limit.min, limit.max))
        }
        Family::Uniform => {
            if limit.span() == 0.0 {
                return Ok(limit.min);
            }
            let value = round_to(rng.gen_range(limit.min..=limit.max), limit.decimals);
            Ok(value.clamp(limit.min, limit.max))
        }
    }
}

/// Standard `Beta(alpha, beta)` variate in `[0, 1]`.
///
/// Built from two Gamma variates kept in log space, so shapes well below 1
/// cannot underflow both draws to zero.
pub fn sample_beta<R: Rng + ?Sized>(
    metric: Metric,
    alpha: f64,
    beta: f64,
    rng: &mut R,
) -> Result<f64> {
    let ln_x = ln_gamma_variate(metric, alpha, rng)?;
    let ln_y = ln_gamma_variate(metric, beta, rng)?;
    let unit = 1.0 / (1.0 + (ln_y - ln_x).exp());
    Ok(unit.clamp(0.0, 1.0))
}

fn ln_gamma_variate<R: Rng + ?Sized>(metric: Metric, shape: f64, rng: &mut R) -> Result<f64> {
    let to_err = |e: rand_distr::GammaError| Error::Distribution {
        metric,
        reason: e.to_string(),
    };

    if shape < 1.0 {
        // Gamma(a) = Gamma(a + 1) * U^(1/a)
        let g = Gamma::new(shape + 1.0, 1.0).map_err(to_err)?.sample(rng);
        let u: f64 = Open01.sample(rng);
        Ok(g.ln() + u.ln() / shape)
    } else {
        Ok(Gamma::new(shape, 1.0).map_err(to_err)?.sample(rng).ln())
    }
}

/// Number of days in `month`; February is always 28.
pub fn days_in_month(month: u32) -> u32 {
    match month {
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Random birth date as `(year, month, day)` for someone aged within `limit`.
pub fn birth<R: Rng + ?Sized>(
    limit: &Limit,
    current_year: i32,
    rng: &mut R,
) -> Result<(i32, u32, u32)> {
    let unit = sample_beta(Metric::Age, AGE_SHAPE.0, AGE_SHAPE.1, rng)?;
    let age = (limit.min + limit.span() * unit).trunc() as i32;

    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=days_in_month(month));

    Ok((current_year - age, month, day))
}

/// Initial `(latitude, longitude)` drawn uniformly from the GPS limits.
pub fn position<R: Rng + ?Sized>(limits: &Limits, rng: &mut R) -> Result<(f64, f64)> {
    let lat = sample(Metric::Latitude, &limits.latitude, rng)?;
    let lon = sample(Metric::Longitude, &limits.longitude, rng)?;
    Ok((lat, lon))
}

/// Moves a position by `north_m`/`east_m` meters on a flat-earth
/// approximation, wrapping latitude into `[-90, 90)` and longitude into
/// `[-180, 180)`.
pub fn displace(lat: f64, lon: f64, north_m: f64, east_m: f64, limits: &Limits) -> (f64, f64) {
    let d_lat = north_m / EARTH_RADIUS_M;
    let d_lon = east_m / (EARTH_RADIUS_M * lat.to_radians().cos());

    let n_lat = lat + d_lat.to_degrees();
    let n_lon = lon + d_lon.to_degrees();

    let n_lat = (n_lat + 90.0).rem_euclid(180.0) - 90.0;
    let n_lon = (n_lon + 180.0).rem_euclid(360.0) - 180.0;

    (
        round_to(n_lat, limits.latitude.decimals),
        round_to(n_lon, limits.longitude.decimals),
    )
}

/// Steps walked during `interval`, about one per second.
pub fn steps<R: Rng + ?Sized>(interval: Duration, rng: &mut R) -> u64 {
    let secs = interval.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    rng.gen_range(0.0..=secs).round() as u64
}
