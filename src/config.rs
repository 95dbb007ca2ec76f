//! Run configuration.
//!
//! Every field has a default suited to a five band
//! multispectral camera with a matching reflectance panel.
//! A flight folder may override any of them with a
//! `calibration.json` file.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use chrono::Duration;
use serde_derive::*;

use crate::{
    error::{Error, Result},
    exif::ExifToolConfig,
    panel::FactorKind,
};

pub const CONFIG_FILE_NAME: &str = "calibration.json";

/// Known reflectance of the calibration panel, blue to NIR.
pub const DEFAULT_PANEL_REFLECTANCE: [f64; 5] = [0.508, 0.509, 0.509, 0.509, 0.506];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Glob of band images, relative to the flight folder.
    pub image_pattern: String,
    /// Band numbers left out of calibration.
    pub excluded_bands: Vec<u32>,
    /// Panel reflectance per active band; its length is the
    /// number of bands in a capture.
    pub reference_reflectance: Vec<f64>,
    pub factor_kind: FactorKind,
    /// Output folder, relative to the flight folder.
    pub output_dir: PathBuf,
    pub capture_time_tolerance_ms: i64,
    /// Panel region map, relative to the flight folder.
    pub panel_regions: PathBuf,
    pub exiftool: ExifToolConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            image_pattern: "IMG_*.tif".into(),
            excluded_bands: vec![6, 7],
            reference_reflectance: DEFAULT_PANEL_REFLECTANCE.to_vec(),
            factor_kind: FactorKind::default(),
            output_dir: "calibrated".into(),
            capture_time_tolerance_ms: 1000,
            panel_regions: "panels.json".into(),
            exiftool: ExifToolConfig::default(),
        }
    }
}

impl CalibrationConfig {
    /// The `calibration.json` of a flight folder, if any.
    pub fn file_in(flight_dir: &Path) -> Option<PathBuf> {
        let path = flight_dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Configuration for a flight folder: its
    /// `calibration.json` if present, defaults otherwise.
    pub fn for_flight(flight_dir: &Path) -> Result<Self> {
        let config = match Self::file_in(flight_dir) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(rdr)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference_reflectance.is_empty() {
            return Err(Error::InvalidConfig("reference reflectance is empty".into()));
        }
        if let Some(r) = self
            .reference_reflectance
            .iter()
            .find(|r| !r.is_finite() || **r <= 0.)
        {
            return Err(Error::InvalidConfig(format!(
                "reference reflectance {} is not positive",
                r
            )));
        }
        if self.capture_time_tolerance_ms < 0 {
            return Err(Error::InvalidConfig(format!(
                "capture time tolerance {} ms is negative",
                self.capture_time_tolerance_ms
            )));
        }
        Ok(())
    }

    pub fn band_count(&self) -> usize {
        self.reference_reflectance.len()
    }

    pub fn capture_time_tolerance(&self) -> Duration {
        Duration::milliseconds(self.capture_time_tolerance_ms)
    }
}
