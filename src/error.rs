//! Errors raised while calibrating a flight.
//!
//! A panel that could not be detected is *not* an error;
//! see [`PanelReading`][crate::panel::PanelReading].

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no calibration panel detected before or after the flight")]
    NoPanelAvailable,

    #[error("{count} band images do not split into whole captures of {band_count} bands")]
    MalformedCaptureGrouping { count: usize, band_count: usize },

    #[error("capture starting at {path:?} has bands {found:?}, expected {expected:?}")]
    UnexpectedBandLayout {
        path: PathBuf,
        expected: Vec<u32>,
        found: Vec<u32>,
    },

    #[error("band images of capture starting at {path:?} span {spread_ms} ms (tolerance: {tolerance_ms} ms)")]
    CaptureTimeSpread {
        path: PathBuf,
        spread_ms: i64,
        tolerance_ms: i64,
    },

    #[error("captures starting at {first:?} and {second:?} are not in strictly increasing time order")]
    NonMonotonicCaptures { first: PathBuf, second: PathBuf },

    #[error("a flight needs a panel capture on each end; found {0} capture(s)")]
    TooFewCaptures(usize),

    #[error("capture has no band images")]
    EmptyCapture,

    #[error("panel factors before ({before}) and after ({after}) the flight are of different kinds")]
    MismatchedPanelKinds { before: String, after: String },

    #[error("expected {expected} per-band values, found {found}")]
    FactorCount { expected: usize, found: usize },

    #[error("metadata for {path:?}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("invalid radiometric metadata: {0}")]
    Radiometric(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported pixel format in {path:?}: {format}")]
    UnsupportedPixelFormat { path: PathBuf, format: String },

    #[error("external tool `{tool}` failed: {reason}")]
    ExternalToolFailure { tool: String, reason: String },

    #[error("tiff error in {path:?}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    pub(crate) fn tiff<P: Into<PathBuf>>(path: P) -> impl FnOnce(tiff::TiffError) -> Self {
        let path = path.into();
        move |source| Error::Tiff { path, source }
    }

    pub(crate) fn metadata<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Error::Metadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
