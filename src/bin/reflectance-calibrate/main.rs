mod args;

use anyhow::Result;
use reflectance::{calibrate_flight, Error};

use crate::args::Args;

/// Exit status when neither panel capture shows the panel.
const NO_PANEL_EXIT_CODE: i32 = 2;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;

    let summary = match calibrate_flight(&args.flight_dir) {
        Err(Error::NoPanelAvailable) => {
            eprintln!("No calibration panel detected before or after the flight");
            std::process::exit(NO_PANEL_EXIT_CODE);
        }
        res => res?,
    };

    eprintln!(
        "Calibrated {} images from {} captures",
        summary.images_written(),
        summary.captures.len()
    );
    if !summary.metadata_propagated {
        eprintln!("Metadata was not copied to the calibrated images");
    }
    Ok(())
}
