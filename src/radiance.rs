//! Conversion of raw sensor values to radiance.
//!
//! Uses the per-band radiometric model of the camera
//! metadata:
//!
//! ```text
//! L = a1 / (g * te) * (p - pBL) / (1 + a2 * y / te - a3 * y) / 2^bits
//! ```
//!
//! where `p` is the raw value at row `y`, `pBL` the dark
//! level, `te` the exposure time, `g` the sensor gain and
//! `a1..a3` the calibration coefficients. Vignetting is not
//! modelled.

use std::convert::TryFrom;

use ndarray::{Array2, Zip};

use crate::{
    error::{Error, Result},
    metadata::BandMetadata,
};

/// Parameters to compute radiance from raw sensor values.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiometricSettings {
    a1: f64,
    a2: f64,
    a3: f64,
    dark_level: f64,
    exposure_time: f64,
    gain: f64,
    bits_per_sample: u32,
}

impl TryFrom<&BandMetadata> for RadiometricSettings {
    type Error = Error;

    fn try_from(meta: &BandMetadata) -> Result<Self> {
        let band = meta.band_name.as_deref().unwrap_or("unnamed");
        let invalid = |reason: String| Error::Radiometric(format!("band {}: {}", band, reason));

        let (a1, a2, a3) = match *meta.radiometric_calibration.as_slice() {
            [a1, a2, a3] => (a1, a2, a3),
            _ => {
                return Err(invalid(format!(
                    "expected 3 radiometric calibration coefficients, found {}",
                    meta.radiometric_calibration.len()
                )))
            }
        };
        if !(meta.exposure_time > 0.) {
            return Err(invalid(format!("exposure time {} is not positive", meta.exposure_time)));
        }
        if !(meta.gain() > 0.) {
            return Err(invalid(format!("ISO speed {} is not positive", meta.iso_speed)));
        }
        if meta.bits_per_sample == 0 || meta.bits_per_sample > 32 {
            return Err(invalid(format!("unsupported bit depth {}", meta.bits_per_sample)));
        }

        Ok(RadiometricSettings {
            a1,
            a2,
            a3,
            dark_level: meta.dark_level(),
            exposure_time: meta.exposure_time,
            gain: meta.gain(),
            bits_per_sample: meta.bits_per_sample,
        })
    }
}

impl RadiometricSettings {
    pub fn radiance_transform(&self) -> impl Fn(usize, f64) -> f64 + Sync + '_ {
        let scale = self.a1 / (self.gain * self.exposure_time) / 2f64.powi(self.bits_per_sample as i32);
        move |row, raw| {
            let y = row as f64;
            // row-dependent correction for the rolling shutter read out
            let r = 1. / (1. + self.a2 * y / self.exposure_time - self.a3 * y);
            (r * (raw - self.dark_level)).max(0.) * scale
        }
    }

    pub fn raw_to_radiance(&self, raw: &Array2<u16>) -> Array2<f32> {
        let t = self.radiance_transform();
        Zip::indexed(raw).par_map_collect(|(row, _), &val| t(row, val as f64) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::read_exiftool_json;

    fn sample_settings() -> RadiometricSettings {
        RadiometricSettings {
            a1: 0.5,
            a2: 0.,
            a3: 0.,
            dark_level: 100.,
            exposure_time: 0.5,
            gain: 1.,
            bits_per_sample: 1,
        }
    }

    #[test]
    fn subtracts_dark_level_and_scales() {
        let settings = sample_settings();
        let t = settings.radiance_transform();
        // (300 - 100) * 0.5 / (1 * 0.5) / 2
        assert!((t(0, 300.) - 100.).abs() < 1e-12);
        assert!((t(7, 300.) - 100.).abs() < 1e-12);
    }

    #[test]
    fn clamps_below_dark_level() {
        let settings = sample_settings();
        let t = settings.radiance_transform();
        assert_eq!(t(3, 50.), 0.);
    }

    #[test]
    fn row_gradient_applies() {
        let settings = RadiometricSettings {
            a2: 0.05,
            ..sample_settings()
        };
        let t = settings.radiance_transform();
        // r = 1 / (1 + 0.05 * 10 / 0.5) = 0.5
        assert!((t(10, 300.) - 50.).abs() < 1e-12);
    }

    #[test]
    fn converts_whole_frame() {
        let raw = Array2::from_elem((4, 3), 300u16);
        let radiance = sample_settings().raw_to_radiance(&raw);
        assert_eq!(radiance.dim(), (4, 3));
        assert!(radiance.iter().all(|&v| (v - 100.).abs() < 1e-4));
    }

    #[test]
    fn from_metadata() -> Result<()> {
        let entries = read_exiftool_json(crate::metadata::tests::SAMPLE.as_bytes())?;
        let settings = RadiometricSettings::try_from(&entries[0].metadata)?;
        assert_eq!(settings.dark_level, 4800.);
        assert_eq!(settings.gain, 2.);

        let mut meta = entries[0].metadata.clone();
        meta.radiometric_calibration.pop();
        assert!(RadiometricSettings::try_from(&meta).is_err());
        Ok(())
    }
}
