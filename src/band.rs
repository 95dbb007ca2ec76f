//! Band identification from file names.
//!
//! Multispectral cameras write one file per band and encode
//! the (1-based) band number as the last `_`-separated
//! component of the file stem: `IMG_0042_3.tif` is band 3 of
//! capture 42.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

/// Band number encoded in the file name, if any.
pub fn band_number(path: &Path) -> Option<u32> {
    lazy_static! {
        static ref SUFFIX: Regex = Regex::new(r"_(\d+)$").unwrap();
    }
    let stem = path.file_stem()?.to_str()?;
    SUFFIX.captures(stem)?.get(1)?.as_str().parse().ok()
}

/// Keep the band images that take part in calibration,
/// sorted by file name.
///
/// Files whose name carries no band number are skipped with a
/// warning, as are the `excluded` bands (typically
/// panchromatic and thermal).
pub fn select_band_images<I>(paths: I, excluded: &[u32]) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut selected: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| match band_number(path) {
            Some(band) => !excluded.contains(&band),
            None => {
                warn!("skipping {:?}: no band number in file name", path);
                false
            }
        })
        .collect();
    selected.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    selected
}

/// Check that every capture lists the same, strictly
/// increasing, band numbers as the first one.
pub fn check_band_layout(groups: &[Vec<PathBuf>]) -> Result<()> {
    let numbers = |group: &[PathBuf]| -> Vec<u32> {
        group
            .iter()
            .map(|p| band_number(p).unwrap_or(0))
            .collect()
    };

    let expected = match groups.first() {
        Some(first) => numbers(first),
        None => return Ok(()),
    };

    for group in groups {
        let found = numbers(group);
        let increasing = found.windows(2).all(|w| w[0] < w[1]);
        if !increasing || found != expected {
            return Err(Error::UnexpectedBandLayout {
                path: group[0].clone(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn parses_band_suffix() {
        assert_eq!(band_number(Path::new("flight/IMG_0042_3.tif")), Some(3));
        assert_eq!(band_number(Path::new("IMG_0042_10.tif")), Some(10));
        assert_eq!(band_number(Path::new("notes.txt")), None);
    }

    #[test]
    fn drops_excluded_and_sorts() {
        let selected = select_band_images(
            paths(&[
                "IMG_0001_2.tif",
                "IMG_0001_6.tif",
                "IMG_0000_1.tif",
                "IMG_0001_1.tif",
                "IMG_0001_7.tif",
                "stray.tif",
            ]),
            &[6, 7],
        );
        assert_eq!(
            selected,
            paths(&["IMG_0000_1.tif", "IMG_0001_1.tif", "IMG_0001_2.tif"])
        );
    }

    #[test]
    fn layout_must_match_first_capture() {
        let good = vec![
            paths(&["IMG_0000_1.tif", "IMG_0000_2.tif"]),
            paths(&["IMG_0001_1.tif", "IMG_0001_2.tif"]),
        ];
        assert!(check_band_layout(&good).is_ok());

        let shifted = vec![
            paths(&["IMG_0000_1.tif", "IMG_0000_2.tif"]),
            paths(&["IMG_0000_3.tif", "IMG_0001_1.tif"]),
        ];
        assert!(matches!(
            check_band_layout(&shifted),
            Err(Error::UnexpectedBandLayout { .. })
        ));
    }
}
