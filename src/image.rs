//! TIFF band frames.
//!
//! Raw frames are single channel 8 or 16 bit TIFFs as written
//! by the camera; calibrated frames are written back as
//! single channel 32-bit float TIFFs.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use ndarray::Array2;
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder},
};

use crate::{
    error::{Error, Result},
    metadata::BandMetadata,
};

/// A single raw band frame and the metadata describing it.
#[derive(Debug, Clone)]
pub struct BandImage {
    pub metadata: BandMetadata,
    pub raw: Array2<u16>,
}

impl BandImage {
    pub fn load(path: &Path, metadata: BandMetadata) -> Result<Self> {
        Ok(BandImage {
            raw: read_raw_tiff(path)?,
            metadata,
        })
    }
}

/// Read a single channel 8 or 16 bit TIFF as a `(rows,
/// cols)` array of raw values.
pub fn read_raw_tiff(path: &Path) -> Result<Array2<u16>> {
    let mut decoder =
        Decoder::new(BufReader::new(File::open(path)?)).map_err(Error::tiff(path))?;
    let (width, height) = decoder.dimensions().map_err(Error::tiff(path))?;

    let values: Vec<u16> = match decoder.read_image().map_err(Error::tiff(path))? {
        DecodingResult::U16(values) => values,
        DecodingResult::U8(values) => values.into_iter().map(u16::from).collect(),
        _ => {
            return Err(Error::UnsupportedPixelFormat {
                path: path.to_path_buf(),
                format: format!("{:?}", decoder.colortype().map_err(Error::tiff(path))?),
            })
        }
    };

    let expected = width as usize * height as usize;
    if values.len() != expected {
        return Err(Error::UnsupportedPixelFormat {
            path: path.to_path_buf(),
            format: format!("{} samples for a {}x{} image", values.len(), width, height),
        });
    }
    Ok(Array2::from_shape_vec((height as usize, width as usize), values)?)
}

/// Write a calibrated image as a single channel 32-bit float
/// TIFF.
pub fn write_reflectance_tiff(path: &Path, image: &Array2<f32>) -> Result<()> {
    let (ht, wid) = image.dim();
    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(writer).map_err(Error::tiff(path))?;

    // logical order is row-major, whatever the memory layout
    let data: Vec<f32> = image.iter().copied().collect();
    encoder
        .write_image::<colortype::Gray32Float>(wid as u32, ht as u32, &data)
        .map_err(Error::tiff(path))?;
    Ok(())
}
