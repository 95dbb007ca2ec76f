//! Per-band sensor metadata.
//!
//! Parsed from the JSON output of `exiftool -j -n`. Only the
//! tags needed to compute radiance and the capture time are
//! read; everything else is ignored.
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::{fs::File, io::BufReader};
//! use reflectance::metadata::read_exiftool_json;
//!
//! let entries = read_exiftool_json(BufReader::new(File::open("metadata.json")?))?;
//! for entry in entries {
//!     println!("{}: {}", entry.source_file, entry.metadata.utc_time());
//! }
//! # Ok(())
//! # }
//! ```

use std::io::Read;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_derive::*;

use crate::error::Result;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct BandMetadata {
    #[serde(default)]
    pub band_name: Option<String>,

    /// Radiometric calibration coefficients `[a1, a2, a3]`.
    #[serde(deserialize_with = "serde_helpers::float_list")]
    pub radiometric_calibration: Vec<f64>,

    /// Per-pixel-channel dark levels; their mean is used.
    #[serde(deserialize_with = "serde_helpers::float_list")]
    pub black_level: Vec<f64>,

    /// Exposure time in seconds.
    pub exposure_time: f64,

    #[serde(rename = "ISOSpeed")]
    pub iso_speed: f64,

    pub bits_per_sample: u32,

    #[serde(deserialize_with = "serde_helpers::exif_datetime")]
    pub date_time_original: NaiveDateTime,

    /// Fractional seconds of `DateTimeOriginal`.
    #[serde(default, deserialize_with = "serde_helpers::subsec_fraction")]
    pub sub_sec_time: f64,
}

impl BandMetadata {
    /// Capture time; the camera records `DateTimeOriginal`
    /// in UTC.
    pub fn utc_time(&self) -> DateTime<Utc> {
        let nanos = (self.sub_sec_time * 1e9).round() as i64;
        Utc.from_utc_datetime(&(self.date_time_original + Duration::nanoseconds(nanos)))
    }

    pub fn gain(&self) -> f64 {
        self.iso_speed / 100.
    }

    pub fn dark_level(&self) -> f64 {
        if self.black_level.is_empty() {
            0.
        } else {
            self.black_level.iter().sum::<f64>() / self.black_level.len() as f64
        }
    }
}

/// One element of the exiftool JSON array.
#[derive(Deserialize, Debug, Clone)]
pub struct SourcedMetadata {
    #[serde(rename = "SourceFile")]
    pub source_file: String,

    #[serde(flatten)]
    pub metadata: BandMetadata,
}

pub fn read_exiftool_json<R: Read>(rdr: R) -> Result<Vec<SourcedMetadata>> {
    Ok(serde_json::from_reader(rdr)?)
}

mod serde_helpers {
    use chrono::NaiveDateTime;
    use lazy_static::lazy_static;
    use regex::Regex;
    use serde::*;
    use serde_derive::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FloatList {
        List(Vec<f64>),
        Single(f64),
        Text(String),
    }

    /// Lists come as JSON arrays for XMP tags, and as space
    /// separated strings for EXIF rationals.
    pub fn float_list<'de, D>(de: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        match FloatList::deserialize(de)? {
            FloatList::List(values) => Ok(values),
            FloatList::Single(value) => Ok(vec![value]),
            FloatList::Text(text) => text
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(|t| t.parse().map_err(Error::custom))
                .collect(),
        }
    }

    pub fn exif_datetime<'de, D>(de: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^\d{4}:\d{2}:\d{2} \d{2}:\d{2}:\d{2}").unwrap();
        }

        use serde::de::Error;
        let str_rep = <String as Deserialize>::deserialize(de)?;
        let stamp = RE
            .find(&str_rep)
            .ok_or_else(|| Error::custom("unexpected format: must begin with `YYYY:MM:DD HH:MM:SS`"))?;
        NaiveDateTime::parse_from_str(stamp.as_str(), "%Y:%m:%d %H:%M:%S").map_err(Error::custom)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SubSec {
        Number(u64),
        Text(String),
    }

    /// `SubSecTime` holds the digits after the decimal point;
    /// exiftool quotes it when it has leading zeros.
    pub fn subsec_fraction<'de, D>(de: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let digits = match SubSec::deserialize(de)? {
            SubSec::Number(n) => n.to_string(),
            SubSec::Text(text) => text.trim().to_string(),
        };
        if digits.is_empty() {
            return Ok(0.);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::custom(format!("unexpected sub-second value: {}", digits)));
        }
        format!("0.{}", digits).parse().map_err(Error::custom)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Timelike;

    pub(crate) const SAMPLE: &str = r#"[{
        "SourceFile": "flight/IMG_0003_1.tif",
        "BandName": "Blue",
        "RadiometricCalibration": [0.00018, 1.2e-07, 1.4e-05],
        "BlackLevel": "4800 4800 4800 4800",
        "ExposureTime": 0.0005,
        "ISOSpeed": 200,
        "BitsPerSample": 16,
        "DateTimeOriginal": "2025:06:22 10:15:30",
        "SubSecTime": "038723",
        "GPSLatitude": 49.1
    }]"#;

    #[test]
    fn parses_exiftool_json() -> Result<()> {
        let entries = read_exiftool_json(SAMPLE.as_bytes())?;
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.source_file, "flight/IMG_0003_1.tif");

        let meta = &entry.metadata;
        assert_eq!(meta.band_name.as_deref(), Some("Blue"));
        assert_eq!(meta.radiometric_calibration, vec![0.00018, 1.2e-07, 1.4e-05]);
        assert_eq!(meta.dark_level(), 4800.);
        assert_eq!(meta.gain(), 2.);
        assert_eq!(meta.bits_per_sample, 16);

        let time = meta.utc_time();
        assert_eq!(time.second(), 30);
        assert_eq!(time.nanosecond(), 38_723_000);
        Ok(())
    }

    #[test]
    fn rejects_malformed_datetime() {
        let json = SAMPLE.replace("2025:06:22 10:15:30", "yesterday");
        assert!(read_exiftool_json(json.as_bytes()).is_err());
    }

    #[test]
    fn subsec_is_optional() -> Result<()> {
        let json = SAMPLE.replace(r#""SubSecTime": "038723","#, "");
        let entries = read_exiftool_json(json.as_bytes())?;
        assert_eq!(entries[0].metadata.utc_time().nanosecond(), 0);
        Ok(())
    }
}
