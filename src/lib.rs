//! Radiometric calibration of multispectral drone imagery.
//!
//! A flight folder holds one 16-bit TIFF per band per
//! capture, named `IMG_<capture>_<band>.tif`. The first and
//! last capture photograph a reflectance panel of known
//! reflectance. This crate converts every flight capture in
//! between to reflectance images:
//!
//! 1. Raw sensor values are converted to [radiance] from the
//! sensor metadata (calibration coefficients, black level,
//! exposure and gain) of each band image.
//!
//! 2. The panel captures give one [factor per
//! band](panel::extract_panel_factors). Factors of the two
//! panels are [interpolated](interpolate::FactorPolicy) in
//! time for each flight capture, or the single detected
//! panel is used as is.
//!
//! 3. Radiance times factor (or radiance scaled by the
//! irradiance) is written as a 32-bit float TIFF, and GPS /
//! XMP tags are copied from the raw images with [ExifTool].
//!
//! # Usage
//!
//! A whole flight is calibrated with
//! [`calibrate_flight`][pipeline::calibrate_flight], which
//! reads `calibration.json` from the flight folder if
//! present (see [`config::CalibrationConfig`]).
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::path::Path;
//! use reflectance::pipeline::calibrate_flight;
//!
//! let summary = calibrate_flight(Path::new("flights/0001SET/images"))?;
//! eprintln!("{} images calibrated", summary.images_written());
//! # Ok(())
//! # }
//! ```
//!
//! The individual steps are usable on their own. For
//! instance, radiance of a raw frame from the JSON output of
//! `exiftool -j -n`:
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::{convert::TryFrom, fs::File, io::BufReader, path::Path};
//! use reflectance::{
//!     image::read_raw_tiff, metadata::read_exiftool_json, radiance::RadiometricSettings,
//! };
//!
//! let entries = read_exiftool_json(BufReader::new(File::open("metadata.json")?))?;
//! let settings = RadiometricSettings::try_from(&entries[0].metadata)?;
//! let raw = read_raw_tiff(Path::new(&entries[0].source_file))?;
//! let radiance = settings.raw_to_radiance(&raw);
//! # Ok(())
//! # }
//! ```
//!
//! [ExifTool]: //exiftool.org

pub mod error;

pub mod band;
pub mod metadata;
pub mod radiance;
pub mod image;
pub mod capture;
pub mod panel;
pub mod interpolate;
pub mod convert;

pub mod exif;
pub mod config;
pub mod logging;
pub mod pipeline;

pub mod cli;

pub use crate::error::{Error, Result};
pub use crate::pipeline::{calibrate_flight, RunSummary};
