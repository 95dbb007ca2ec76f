//! Captures: one synchronized image per active band.
//!
//! A flight folder is a flat list of band images. They are
//! [grouped](group_captures) into captures of one image per
//! band, [ordered](order_captures) by acquisition time, and
//! [split](FlightLayout::split) into the panel capture before
//! the flight, the flight captures, and the panel capture
//! after the flight.
//!
//! Pixel access goes through [`RadiometricCapture`], built by
//! a [`CaptureSource`]; [`TiffCaptureSource`] reads TIFF band
//! frames and exiftool metadata.

use std::{
    collections::HashMap,
    convert::TryFrom,
    f64::consts::PI,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use itertools::{Itertools, MinMaxResult};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    image::BandImage,
    metadata::{BandMetadata, SourcedMetadata},
    panel::{PanelRegion, PanelRegions},
    radiance::RadiometricSettings,
};

/// Pixel level view of one capture.
pub trait RadiometricCapture {
    fn band_count(&self) -> usize;

    fn timestamp(&self) -> DateTime<Utc>;

    /// Source image of each band, in band order.
    fn paths(&self) -> &[PathBuf];

    fn radiance(&self, band: usize) -> Result<Array2<f32>>;

    /// Panel region of a band, `None` if no panel is visible.
    fn panel_region(&self, band: usize) -> Option<PanelRegion>;

    /// Reflectance of every band given the irradiance on each.
    fn reflectance(&self, irradiance: &[f64]) -> Result<Vec<Array2<f32>>> {
        if irradiance.len() != self.band_count() {
            return Err(Error::FactorCount {
                expected: self.band_count(),
                found: irradiance.len(),
            });
        }
        irradiance
            .iter()
            .enumerate()
            .map(|(band, &irr)| {
                let mut radiance = self.radiance(band)?;
                let scale = PI / irr;
                radiance.par_mapv_inplace(|v| (v as f64 * scale) as f32);
                Ok(radiance)
            })
            .collect()
    }
}

/// Builds captures from ordered lists of band image paths.
pub trait CaptureSource {
    type Capture: RadiometricCapture;

    /// Acquisition time of a single band image.
    fn image_time(&self, path: &Path) -> Result<DateTime<Utc>>;

    fn load(&self, paths: &[PathBuf]) -> Result<Self::Capture>;
}

/// Split a flat, sorted list of band images into captures
/// of `band_count` consecutive images.
pub fn group_captures(paths: &[PathBuf], band_count: usize) -> Result<Vec<Vec<PathBuf>>> {
    if band_count == 0 || paths.len() % band_count != 0 {
        return Err(Error::MalformedCaptureGrouping {
            count: paths.len(),
            band_count,
        });
    }
    Ok(paths.chunks(band_count).map(<[PathBuf]>::to_vec).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureGroup {
    pub paths: Vec<PathBuf>,
    /// Earliest acquisition time among the band images.
    pub timestamp: DateTime<Utc>,
}

/// Timestamp grouped band images and sort them by time.
///
/// Band images of a capture must agree within `tolerance`,
/// and no two captures may share a timestamp.
pub fn order_captures<F>(
    groups: Vec<Vec<PathBuf>>,
    tolerance: Duration,
    mut image_time: F,
) -> Result<Vec<CaptureGroup>>
where
    F: FnMut(&Path) -> Result<DateTime<Utc>>,
{
    let mut captures = Vec::with_capacity(groups.len());
    for paths in groups {
        let times = paths
            .iter()
            .map(|p| image_time(p))
            .collect::<Result<Vec<_>>>()?;
        let (earliest, latest) = match times.into_iter().minmax() {
            MinMaxResult::NoElements => continue,
            MinMaxResult::OneElement(t) => (t, t),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        if latest - earliest > tolerance {
            return Err(Error::CaptureTimeSpread {
                path: paths[0].clone(),
                spread_ms: (latest - earliest).num_milliseconds(),
                tolerance_ms: tolerance.num_milliseconds(),
            });
        }
        captures.push(CaptureGroup {
            paths,
            timestamp: earliest,
        });
    }

    let by_name: Vec<PathBuf> = captures.iter().map(|c| c.paths[0].clone()).collect();
    captures.sort_by_key(|c| c.timestamp);
    if captures.iter().map(|c| &c.paths[0]).ne(by_name.iter()) {
        warn!("file name order differs from acquisition time order; using acquisition time");
    }

    if let Some((a, b)) = captures
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.timestamp >= b.timestamp)
    {
        return Err(Error::NonMonotonicCaptures {
            first: a.paths[0].clone(),
            second: b.paths[0].clone(),
        });
    }
    Ok(captures)
}

/// Chronological captures of one flight. The first and last
/// capture are assumed to photograph the calibration panel.
#[derive(Debug, Clone)]
pub struct FlightLayout {
    pub before: CaptureGroup,
    pub flights: Vec<CaptureGroup>,
    pub after: CaptureGroup,
}

impl FlightLayout {
    pub fn split(mut captures: Vec<CaptureGroup>) -> Result<Self> {
        if captures.len() < 2 {
            return Err(Error::TooFewCaptures(captures.len()));
        }
        let after = captures.remove(captures.len() - 1);
        let before = captures.remove(0);
        Ok(FlightLayout {
            before,
            flights: captures,
            after,
        })
    }
}

/// Captures read from TIFF band frames, with sensor metadata
/// gathered up front (typically by exiftool) and panel
/// regions supplied externally.
pub struct TiffCaptureSource {
    metadata: HashMap<String, BandMetadata>,
    regions: PanelRegions,
}

fn file_key(path: &Path) -> Option<String> {
    Some(path.file_name()?.to_str()?.to_string())
}

impl TiffCaptureSource {
    pub fn new(metadata: Vec<SourcedMetadata>, regions: PanelRegions) -> Self {
        let metadata = metadata
            .into_iter()
            .filter_map(|m| Some((file_key(Path::new(&m.source_file))?, m.metadata)))
            .collect();
        TiffCaptureSource { metadata, regions }
    }

    fn metadata_for(&self, path: &Path) -> Result<&BandMetadata> {
        file_key(path)
            .and_then(|key| self.metadata.get(&key))
            .ok_or_else(|| Error::metadata(path, "no metadata read for image"))
    }
}

impl CaptureSource for TiffCaptureSource {
    type Capture = TiffCapture;

    fn image_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        Ok(self.metadata_for(path)?.utc_time())
    }

    fn load(&self, paths: &[PathBuf]) -> Result<TiffCapture> {
        let images = paths
            .par_iter()
            .map(|path| BandImage::load(path, self.metadata_for(path)?.clone()))
            .collect::<Result<Vec<_>>>()?;
        let timestamp = images
            .iter()
            .map(|image| image.metadata.utc_time())
            .min()
            .ok_or(Error::EmptyCapture)?;
        let regions = paths.iter().map(|p| self.regions.for_image(p)).collect();
        debug!("loaded capture at {} from {:?}", timestamp, paths[0]);

        Ok(TiffCapture {
            paths: paths.to_vec(),
            images,
            regions,
            timestamp,
        })
    }
}

pub struct TiffCapture {
    paths: Vec<PathBuf>,
    images: Vec<BandImage>,
    regions: Vec<Option<PanelRegion>>,
    timestamp: DateTime<Utc>,
}

impl RadiometricCapture for TiffCapture {
    fn band_count(&self) -> usize {
        self.images.len()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn radiance(&self, band: usize) -> Result<Array2<f32>> {
        let image = self.images.get(band).ok_or(Error::FactorCount {
            expected: band + 1,
            found: self.images.len(),
        })?;
        let settings = RadiometricSettings::try_from(&image.metadata)?;
        Ok(settings.raw_to_radiance(&image.raw))
    }

    fn panel_region(&self, band: usize) -> Option<PanelRegion> {
        self.regions.get(band).copied().flatten()
    }
}
