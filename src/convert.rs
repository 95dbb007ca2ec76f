//! Conversion of flight captures to reflectance.

use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::{
    capture::RadiometricCapture,
    error::{Error, Result},
    panel::FactorKind,
};

/// Calibrate every band of a capture.
///
/// Reflectance factors multiply the band radiance; irradiance
/// values are handed to the capture's own reflectance
/// computation.
pub fn convert_capture<C: RadiometricCapture>(
    capture: &C,
    factors: &[f64],
    kind: FactorKind,
) -> Result<Vec<Array2<f32>>> {
    if factors.len() != capture.band_count() {
        return Err(Error::FactorCount {
            expected: capture.band_count(),
            found: factors.len(),
        });
    }

    match kind {
        FactorKind::ReflectanceFactor => factors
            .iter()
            .enumerate()
            .map(|(band, &factor)| {
                let mut image = capture.radiance(band)?;
                scale_in_place(&mut image, factor);
                Ok(image)
            })
            .collect(),
        FactorKind::Irradiance => capture.reflectance(factors),
    }
}

pub fn scale_in_place(image: &mut Array2<f32>, factor: f64) {
    image.par_mapv_inplace(|v| (v as f64 * factor) as f32);
}

/// Output file for `input`: same file name, under `output_dir`.
pub fn output_path_for(output_dir: &Path, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| Error::metadata(input, "band image path has no file name"))?;
    Ok(output_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::MockCapture;
    use chrono::{TimeZone, Utc};
    use std::f64::consts::PI;

    fn capture(radiance: &[f32]) -> MockCapture {
        MockCapture::uniform(Utc.with_ymd_and_hms(2025, 6, 22, 10, 0, 0).unwrap(), radiance)
    }

    #[test]
    fn uniform_radiance_scales_by_factor() -> Result<()> {
        let v = 0.3;
        for &f in &[0.5, 1.0, 2.0] {
            let images = convert_capture(&capture(&[v]), &[f], FactorKind::ReflectanceFactor)?;
            let expected = v as f64 * f;
            assert!(images[0]
                .iter()
                .all(|&p| (p as f64 - expected).abs() < 1e-6));
        }
        Ok(())
    }

    #[test]
    fn factors_apply_per_band() -> Result<()> {
        let images = convert_capture(
            &capture(&[1., 1., 1.]),
            &[0.1, 0.2, 0.3],
            FactorKind::ReflectanceFactor,
        )?;
        assert_eq!(images.len(), 3);
        for (image, expected) in images.iter().zip(&[0.1f32, 0.2, 0.3]) {
            assert_eq!(image.dim(), (8, 8));
            assert!(image.iter().all(|p| (p - expected).abs() < 1e-6));
        }
        Ok(())
    }

    #[test]
    fn irradiance_delegates_to_capture() -> Result<()> {
        let images = convert_capture(&capture(&[2.]), &[2. * PI], FactorKind::Irradiance)?;
        assert!(images[0].iter().all(|&p| (p - 1.).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn factor_count_must_match_bands() {
        assert!(matches!(
            convert_capture(&capture(&[1., 1.]), &[1.], FactorKind::ReflectanceFactor),
            Err(Error::FactorCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn output_keeps_file_name() -> Result<()> {
        let out = output_path_for(Path::new("flight/calibrated"), Path::new("flight/IMG_0007_4.tif"))?;
        assert_eq!(out, PathBuf::from("flight/calibrated/IMG_0007_4.tif"));
        Ok(())
    }
}
