//! Calibration of a whole flight folder.
//!
//! The run lists and groups the band images, measures the
//! panels on either end of the flight, picks a
//! [`FactorPolicy`], converts every flight capture, and
//! finally copies metadata onto the written images. It stops
//! at the first error; images already written are left in
//! place. A metadata propagation failure is logged but does
//! not fail the run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    band::{check_band_layout, select_band_images},
    capture::{
        group_captures, order_captures, CaptureSource, FlightLayout, RadiometricCapture,
        TiffCaptureSource,
    },
    cli::capture_progress,
    config::CalibrationConfig,
    convert::{convert_capture, output_path_for},
    error::{Error, Result},
    exif::{ExifTool, MetadataPropagator, PropagationRequest},
    image::write_reflectance_tiff,
    interpolate::FactorPolicy,
    logging::{RunLog, StageTimer},
    panel::{extract_panel_factors, PanelReading, PanelRegions},
};

/// Factors applied to one flight capture and the files
/// written for it.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub timestamp: DateTime<Utc>,
    pub factors: Vec<f64>,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub policy: FactorPolicy,
    pub captures: Vec<CaptureReport>,
    pub metadata_propagated: bool,
}

impl RunSummary {
    pub fn images_written(&self) -> usize {
        self.captures.iter().map(|c| c.outputs.len()).sum()
    }
}

/// Band images of a flight folder taking part in calibration,
/// sorted by file name.
pub fn list_band_images(flight_dir: &Path, config: &CalibrationConfig) -> Result<Vec<PathBuf>> {
    let pattern = flight_dir.join(&config.image_pattern);
    let mut paths = vec![];
    for entry in glob::glob(&pattern.to_string_lossy())? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("skipping unreadable entry: {}", e),
        }
    }
    Ok(select_band_images(paths, &config.excluded_bands))
}

pub struct Calibrator<S, P> {
    config: CalibrationConfig,
    source: S,
    propagator: P,
}

impl<S: CaptureSource, P: MetadataPropagator> Calibrator<S, P> {
    pub fn new(config: CalibrationConfig, source: S, propagator: P) -> Self {
        Calibrator {
            config,
            source,
            propagator,
        }
    }

    /// Calibrate the flight made of `images` (band images of
    /// `flight_dir`, sorted by name) into `output_dir`.
    pub fn run(&self, images: &[PathBuf], flight_dir: &Path, output_dir: &Path) -> Result<RunSummary> {
        let band_count = self.config.band_count();
        info!(
            "started calibrating {} band images ({} bands) in {:?}",
            images.len(),
            band_count,
            flight_dir
        );

        let groups = group_captures(images, band_count)?;
        check_band_layout(&groups)?;
        let captures = order_captures(groups, self.config.capture_time_tolerance(), |p| {
            self.source.image_time(p)
        })?;
        let layout = FlightLayout::split(captures)?;
        info!(
            "{} flight captures between panels at {} and {}",
            layout.flights.len(),
            layout.before.timestamp,
            layout.after.timestamp
        );
        if layout.flights.is_empty() {
            warn!("no flight captures between the panel captures");
        }

        let timer = StageTimer::start("panels");
        let before = self.read_panel(&layout.before.paths)?;
        let after = self.read_panel(&layout.after.paths)?;
        let policy = match FactorPolicy::select(before, after) {
            Ok(policy) => policy,
            Err(Error::NoPanelAvailable) => {
                error!("CRITICAL: no calibration panel detected before or after the flight; nothing calibrated");
                return Err(Error::NoPanelAvailable);
            }
            Err(e) => return Err(e),
        };
        timer.finish();

        let timer = StageTimer::start("calibration");
        let bar = capture_progress(layout.flights.len());
        let mut reports = Vec::with_capacity(layout.flights.len());
        for group in &layout.flights {
            reports.push(self.calibrate_capture(&group.paths, &policy, output_dir)?);
            bar.inc(1);
        }
        bar.finish_and_clear();
        timer.finish();

        let metadata_propagated = self.propagate_metadata(flight_dir, output_dir);

        let summary = RunSummary {
            policy,
            captures: reports,
            metadata_propagated,
        };
        info!(
            "successfully calibrated {} flight images ({} captures)",
            summary.images_written(),
            summary.captures.len()
        );
        Ok(summary)
    }

    fn read_panel(&self, paths: &[PathBuf]) -> Result<PanelReading> {
        let capture = self.source.load(paths)?;
        let reading = extract_panel_factors(
            &capture,
            &self.config.reference_reflectance,
            self.config.factor_kind,
        )?;
        match &reading {
            PanelReading::Detected(factors) => {
                info!("panel at {}: {:?}", factors.timestamp, factors.values)
            }
            PanelReading::Absent(reason) => {
                warn!("no calibration panel in capture {:?}: {}", paths[0], reason)
            }
        }
        Ok(reading)
    }

    fn calibrate_capture(
        &self,
        paths: &[PathBuf],
        policy: &FactorPolicy,
        output_dir: &Path,
    ) -> Result<CaptureReport> {
        let capture = self.source.load(paths)?;
        let timestamp = capture.timestamp();
        let factors = policy.factors_at(timestamp);
        debug!("capture at {}: factors {:?}", timestamp, factors);

        let images = convert_capture(&capture, &factors, policy.kind())?;
        let mut outputs = Vec::with_capacity(images.len());
        for (input, image) in capture.paths().iter().zip(&images) {
            let output = output_path_for(output_dir, input)?;
            write_reflectance_tiff(&output, image)?;
            outputs.push(output);
        }

        Ok(CaptureReport {
            timestamp,
            factors,
            outputs,
        })
    }

    fn propagate_metadata(&self, flight_dir: &Path, output_dir: &Path) -> bool {
        let timer = StageTimer::start("metadata");
        let exiftool = &self.config.exiftool;
        let request = PropagationRequest {
            source_pattern: format!("{}/%f.%e", flight_dir.display()),
            destination: output_dir,
            tags: &exiftool.tags,
            config_file: exiftool.config_file.as_deref(),
        };
        let propagated = match self.propagator.propagate(&request) {
            Ok(()) => true,
            Err(e) => {
                error!("metadata propagation failed; calibrated images keep no GPS/XMP tags: {}", e);
                false
            }
        };
        timer.finish();
        propagated
    }
}

/// Calibrate one flight folder with exiftool and TIFF band
/// images, logging to the output folder.
pub fn calibrate_flight(flight_dir: &Path) -> Result<RunSummary> {
    let config = CalibrationConfig::for_flight(flight_dir)?;
    let output_dir = flight_dir.join(&config.output_dir);
    fs::create_dir_all(&output_dir)?;

    let log = RunLog::create(&output_dir)?;
    log.scope(|| {
        match CalibrationConfig::file_in(flight_dir) {
            Some(path) => info!("using configuration from {:?}", path),
            None => info!("using default configuration"),
        }
        let images = list_band_images(flight_dir, &config)?;

        let exiftool = ExifTool::new(config.exiftool.program.clone());
        let metadata = exiftool.read_metadata(&images)?;
        let regions_path = flight_dir.join(&config.panel_regions);
        let regions = if regions_path.is_file() {
            PanelRegions::from_path(&regions_path)?
        } else {
            warn!("no panel regions at {:?}; panels cannot be measured", regions_path);
            PanelRegions::default()
        };

        let source = TiffCaptureSource::new(metadata, regions);
        Calibrator::new(config, source, exiftool).run(&images, flight_dir, &output_dir)
    })
}
