//! Reference panel measurement.
//!
//! A panel capture photographs a target of known reflectance.
//! Comparing the measured panel radiance with that known
//! reflectance gives, per band, either a *reflectance
//! factor* (`reference / mean radiance`) or the ambient
//! *irradiance* (`π * mean radiance / reference`).
//!
//! Extraction is all-or-nothing: if the panel is missing in
//! any band, the whole capture reads as
//! [`PanelReading::Absent`].

use std::{collections::HashMap, f64::consts::PI, fmt, fs::File, io::BufReader, ops::Range, path::Path};

use chrono::{DateTime, Utc};
use ndarray::{s, Array2};
use serde_derive::*;

use crate::{
    capture::RadiometricCapture,
    error::{Error, Result},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// Multiply radiance by the factor to get reflectance.
    ReflectanceFactor,
    /// Divide `π * radiance` by the irradiance to get
    /// reflectance.
    Irradiance,
}

impl Default for FactorKind {
    fn default() -> Self {
        FactorKind::ReflectanceFactor
    }
}

/// Quadrilateral covering the panel in a band image, as four
/// `[x, y]` pixel corners in any order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct PanelRegion {
    pub corners: [[u32; 2]; 4],
}

impl PanelRegion {
    /// Axis aligned rectangle spanned by the corners, as
    /// half-open `(rows, cols)` ranges.
    pub fn bounds(&self) -> (Range<usize>, Range<usize>) {
        let xs = self.corners.iter().map(|c| c[0] as usize);
        let ys = self.corners.iter().map(|c| c[1] as usize);
        let (x0, x1) = (xs.clone().min().unwrap_or(0), xs.max().unwrap_or(0));
        let (y0, y1) = (ys.clone().min().unwrap_or(0), ys.max().unwrap_or(0));
        (y0..y1, x0..x1)
    }

    /// Mean of `image` inside the region, clipped to the
    /// image. `None` if nothing of the region is inside.
    pub fn mean(&self, image: &Array2<f32>) -> Option<f64> {
        let (ht, wid) = image.dim();
        let (rows, cols) = self.bounds();
        let rows = rows.start.min(ht)..rows.end.min(ht);
        let cols = cols.start.min(wid)..cols.end.min(wid);
        if rows.is_empty() || cols.is_empty() {
            return None;
        }

        let region = image.slice(s![rows, cols]);
        let sum: f64 = region.iter().map(|&v| v as f64).sum();
        Some(sum / region.len() as f64)
    }
}

/// Panel regions keyed by band image file name.
///
/// Read from a JSON object such as
/// `{"IMG_0000_1.tif": [[120, 80], [300, 80], [300, 260], [120, 260]]}`.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct PanelRegions(HashMap<String, PanelRegion>);

impl PanelRegions {
    pub fn from_path(path: &Path) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(rdr)?)
    }

    pub fn for_image(&self, path: &Path) -> Option<PanelRegion> {
        let name = path.file_name()?.to_str()?;
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, region: PanelRegion) {
        self.0.insert(name.into(), region);
    }
}

/// Per-band values measured on one panel capture.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelFactors {
    pub kind: FactorKind,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbsentReason {
    /// No panel region for this band.
    NotDetected { band: usize },
    /// Region lies outside the image.
    EmptyRegion { band: usize },
    /// Mean radiance is zero, negative or not a number.
    DegenerateRadiance { band: usize, mean: f64 },
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbsentReason::NotDetected { band } => write!(f, "no panel detected in band {}", band),
            AbsentReason::EmptyRegion { band } => {
                write!(f, "panel region of band {} is outside the image", band)
            }
            AbsentReason::DegenerateRadiance { band, mean } => {
                write!(f, "mean panel radiance {} of band {} is unusable", mean, band)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelReading {
    Detected(PanelFactors),
    Absent(AbsentReason),
}

impl PanelReading {
    pub fn detected(self) -> Option<PanelFactors> {
        match self {
            PanelReading::Detected(factors) => Some(factors),
            PanelReading::Absent(_) => None,
        }
    }
}

/// Compute per-band panel factors from a panel capture.
///
/// `reference` holds the known reflectance of the panel in
/// each band and must have one entry per band of the
/// capture.
pub fn extract_panel_factors<C: RadiometricCapture>(
    capture: &C,
    reference: &[f64],
    kind: FactorKind,
) -> Result<PanelReading> {
    if reference.len() != capture.band_count() {
        return Err(Error::FactorCount {
            expected: capture.band_count(),
            found: reference.len(),
        });
    }

    let mut values = Vec::with_capacity(reference.len());
    for (band, &rho) in reference.iter().enumerate() {
        let region = match capture.panel_region(band) {
            Some(region) => region,
            None => return Ok(PanelReading::Absent(AbsentReason::NotDetected { band })),
        };

        let radiance = capture.radiance(band)?;
        let mean = match region.mean(&radiance) {
            Some(mean) => mean,
            None => return Ok(PanelReading::Absent(AbsentReason::EmptyRegion { band })),
        };
        if !mean.is_finite() || mean <= 0. {
            return Ok(PanelReading::Absent(AbsentReason::DegenerateRadiance { band, mean }));
        }

        values.push(match kind {
            FactorKind::ReflectanceFactor => rho / mean,
            FactorKind::Irradiance => PI * mean / rho,
        });
    }

    Ok(PanelReading::Detected(PanelFactors {
        kind,
        timestamp: capture.timestamp(),
        values,
    }))
}
