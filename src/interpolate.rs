//! Per-capture panel factors over the time span of a flight.
//!
//! The policy is chosen once per flight from the two panel
//! readings:
//!
//! - both panels detected: factors are linearly
//!   interpolated (or extrapolated) at each capture time;
//! - one panel detected: its factors are used unchanged;
//! - no panel detected: the flight cannot be calibrated.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    error::{Error, Result},
    panel::{FactorKind, PanelFactors, PanelReading},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSide {
    Before,
    After,
}

impl fmt::Display for PanelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelSide::Before => write!(f, "before"),
            PanelSide::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactorPolicy {
    Interpolated {
        before: PanelFactors,
        after: PanelFactors,
    },
    Static {
        factors: PanelFactors,
        side: PanelSide,
    },
}

impl FactorPolicy {
    /// Pick the policy for a flight from its two panel
    /// readings.
    pub fn select(before: PanelReading, after: PanelReading) -> Result<Self> {
        let policy = match (before.detected(), after.detected()) {
            (Some(before), Some(after)) => {
                if before.kind != after.kind {
                    return Err(Error::MismatchedPanelKinds {
                        before: format!("{:?}", before.kind),
                        after: format!("{:?}", after.kind),
                    });
                }
                if before.values.len() != after.values.len() {
                    return Err(Error::FactorCount {
                        expected: before.values.len(),
                        found: after.values.len(),
                    });
                }
                FactorPolicy::Interpolated { before, after }
            }
            (Some(factors), None) => FactorPolicy::Static {
                factors,
                side: PanelSide::Before,
            },
            (None, Some(factors)) => FactorPolicy::Static {
                factors,
                side: PanelSide::After,
            },
            (None, None) => return Err(Error::NoPanelAvailable),
        };

        if let FactorPolicy::Static { side, .. } = &policy {
            warn!(
                "only the panel {} the flight was detected; using its factors for every capture",
                side
            );
        }
        Ok(policy)
    }

    pub fn kind(&self) -> FactorKind {
        match self {
            FactorPolicy::Interpolated { before, .. } => before.kind,
            FactorPolicy::Static { factors, .. } => factors.kind,
        }
    }

    /// Per-band factors for a capture taken at `time`.
    pub fn factors_at(&self, time: DateTime<Utc>) -> Vec<f64> {
        match self {
            FactorPolicy::Static { factors, .. } => factors.values.clone(),
            FactorPolicy::Interpolated { before, after } => {
                let span = seconds_between(before.timestamp, after.timestamp);
                if span == 0. {
                    return before.values.clone();
                }
                let fraction = seconds_between(before.timestamp, time) / span;
                before
                    .values
                    .iter()
                    .zip(&after.values)
                    .map(|(&b, &a)| lerp(b, a, fraction))
                    .collect()
            }
        }
    }
}

/// `before + (after - before) * fraction`, unclamped.
pub fn lerp(before: f64, after: f64, fraction: f64) -> f64 {
    before + (after - before) * fraction
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 * 1e-6,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::AbsentReason;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 22, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn reading(secs: i64, values: &[f64]) -> PanelReading {
        PanelReading::Detected(PanelFactors {
            kind: FactorKind::ReflectanceFactor,
            timestamp: at(secs),
            values: values.to_vec(),
        })
    }

    fn absent() -> PanelReading {
        PanelReading::Absent(AbsentReason::NotDetected { band: 0 })
    }

    #[test]
    fn equal_panels_give_constant_factors() -> Result<()> {
        let policy = FactorPolicy::select(reading(0, &[1.5, 2.5]), reading(100, &[1.5, 2.5]))?;
        for t in [1, 37, 50, 99] {
            assert_eq!(policy.factors_at(at(t)), vec![1.5, 2.5]);
        }
        Ok(())
    }

    #[test]
    fn interpolates_linearly() -> Result<()> {
        let policy = FactorPolicy::select(reading(0, &[1., 4.]), reading(100, &[2., 2.]))?;
        assert!(matches!(policy, FactorPolicy::Interpolated { .. }));

        let mid = policy.factors_at(at(25));
        assert!((mid[0] - 1.25).abs() < 1e-12);
        assert!((mid[1] - 3.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn interpolation_is_monotonic() -> Result<()> {
        let policy = FactorPolicy::select(reading(0, &[1.]), reading(60, &[3.]))?;
        let values: Vec<f64> = (0..=60).map(|t| policy.factors_at(at(t))[0]).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values[0], 1.);
        assert_eq!(values[60], 3.);
        Ok(())
    }

    #[test]
    fn extrapolates_outside_panels() -> Result<()> {
        let policy = FactorPolicy::select(reading(0, &[1.]), reading(10, &[2.]))?;
        assert!((policy.factors_at(at(20))[0] - 3.).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn single_panel_is_used_unchanged() -> Result<()> {
        let policy = FactorPolicy::select(reading(0, &[0.7, 0.8]), absent())?;
        assert!(matches!(
            policy,
            FactorPolicy::Static {
                side: PanelSide::Before,
                ..
            }
        ));
        for t in [-50, 0, 10, 5000] {
            assert_eq!(policy.factors_at(at(t)), vec![0.7, 0.8]);
        }

        let policy = FactorPolicy::select(absent(), reading(90, &[0.9]))?;
        assert_eq!(policy.factors_at(at(0)), vec![0.9]);
        Ok(())
    }

    #[test]
    fn no_panel_is_fatal() {
        assert!(matches!(
            FactorPolicy::select(absent(), absent()),
            Err(Error::NoPanelAvailable)
        ));
    }

    #[test]
    fn panels_must_agree_on_kind() {
        let irradiance = PanelReading::Detected(PanelFactors {
            kind: FactorKind::Irradiance,
            timestamp: at(100),
            values: vec![1.],
        });
        assert!(matches!(
            FactorPolicy::select(reading(0, &[1.]), irradiance),
            Err(Error::MismatchedPanelKinds { .. })
        ));
        assert!(matches!(
            FactorPolicy::select(reading(0, &[1.]), reading(100, &[1., 2.])),
            Err(Error::FactorCount {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn same_time_panels_do_not_divide_by_zero() -> Result<()> {
        let policy = FactorPolicy::select(reading(5, &[1.]), reading(5, &[3.]))?;
        assert_eq!(policy.factors_at(at(7)), vec![1.]);
        Ok(())
    }
}
