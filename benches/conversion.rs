use std::convert::TryFrom;

use criterion::*;
use ndarray::Array2;
use reflectance::{
    convert::scale_in_place, metadata::BandMetadata, radiance::RadiometricSettings,
};

const METADATA: &str = r#"{
    "BandName": "Red",
    "RadiometricCalibration": [0.00018, 1.2e-07, 1.4e-05],
    "BlackLevel": "4800 4800 4800 4800",
    "ExposureTime": 0.0005,
    "ISOSpeed": 200,
    "BitsPerSample": 16,
    "DateTimeOriginal": "2025:06:22 10:15:30",
    "SubSecTime": "038723"
}"#;

/// Full resolution frame of a five band sensor.
const FRAME: (usize, usize) = (1544, 2064);

fn frame() -> Array2<u16> {
    Array2::from_shape_fn(FRAME, |(r, c)| (4800 + (r * 7 + c * 13) % 20_000) as u16)
}

fn conversion(c: &mut Criterion) {
    let metadata: BandMetadata = serde_json::from_str(METADATA).expect("metadata");
    let settings = RadiometricSettings::try_from(&metadata).expect("settings");
    let raw = frame();

    c.bench_function("raw_to_radiance", |b| {
        b.iter(|| settings.raw_to_radiance(black_box(&raw)))
    });

    let radiance = settings.raw_to_radiance(&raw);
    c.bench_function("scale_in_place", |b| {
        b.iter_batched_ref(
            || radiance.clone(),
            |image| scale_in_place(image, black_box(1.83)),
            BatchSize::LargeInput,
        )
    });
}

criterion_group! {
    name = calibration;
    config = Criterion::default().sample_size(10);
    targets = conversion
}

criterion_main!(calibration);
